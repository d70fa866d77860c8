use anyhow::{ensure, Context as _, Result};
use hex_literal::hex;
use thiserror::Error;
use types::{
    config::Config,
    phase0::primitives::{DepositIndex, ExecutionAddress, ExecutionBlockNumber, H256},
};
use web3::types::BlockId;

use crate::provider::Eth1Provider;

/// Selector of `get_deposit_root()`.
const GET_DEPOSIT_ROOT_SELECTOR: [u8; 4] = hex!("c5f2892f");
/// Selector of `get_deposit_count()`.
const GET_DEPOSIT_COUNT_SELECTOR: [u8; 4] = hex!("621fd130");

// `get_deposit_root` returns `bytes32`. `get_deposit_count` returns
// dynamic `bytes` holding a little-endian `uint64`, so its return value is
// an offset word, a length word and a padded payload word.
const DEPOSIT_ROOT_RETURN_LENGTH: usize = 32;
const DEPOSIT_COUNT_RETURN_LENGTH: usize = 96;
const DEPOSIT_COUNT_PAYLOAD_OFFSET: usize = 64;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no contract code at the configured deposit contract address: {address:?}")]
    ContractNotFound { address: ExecutionAddress },
    #[error("failed to resolve the deposit contract")]
    ContractInitFailed,
    #[error("deposit contract returned malformed data: {bytes:?}")]
    MalformedReturnData { bytes: Vec<u8> },
}

/// Handle to a resolved deposit contract.
#[derive(Clone, Copy, Debug)]
pub struct DepositContract {
    pub address: ExecutionAddress,
    pub deploy_block: ExecutionBlockNumber,
}

impl DepositContract {
    /// Checks that the configured address actually hosts code before
    /// handing out a handle. Subscribing to an address without code would
    /// silently never produce an event.
    pub async fn resolve(provider: &impl Eth1Provider, config: &Config) -> Result<Self> {
        let address = config.deposit_contract_address;

        let code = provider
            .get_code(address)
            .await
            .context(Error::ContractInitFailed)?;

        ensure!(!code.is_empty(), Error::ContractNotFound { address });

        Ok(Self {
            address,
            deploy_block: config.deposit_contract_deploy_block,
        })
    }

    pub async fn deposit_root(
        &self,
        provider: &impl Eth1Provider,
        block_id: Option<BlockId>,
    ) -> Result<H256> {
        let bytes = provider
            .call_at_block(self.address, GET_DEPOSIT_ROOT_SELECTOR.to_vec(), block_id)
            .await?;

        decode_deposit_root(bytes)
    }

    pub async fn deposit_count(
        &self,
        provider: &impl Eth1Provider,
        block_id: Option<BlockId>,
    ) -> Result<DepositIndex> {
        let bytes = provider
            .call_at_block(self.address, GET_DEPOSIT_COUNT_SELECTOR.to_vec(), block_id)
            .await?;

        decode_deposit_count(bytes)
    }
}

fn decode_deposit_root(bytes: Vec<u8>) -> Result<H256> {
    ensure!(
        bytes.len() == DEPOSIT_ROOT_RETURN_LENGTH,
        Error::MalformedReturnData { bytes },
    );

    Ok(H256::from_slice(bytes.as_slice()))
}

fn decode_deposit_count(bytes: Vec<u8>) -> Result<DepositIndex> {
    ensure!(
        bytes.len() == DEPOSIT_COUNT_RETURN_LENGTH,
        Error::MalformedReturnData { bytes },
    );

    let payload_range = DEPOSIT_COUNT_PAYLOAD_OFFSET..DEPOSIT_COUNT_PAYLOAD_OFFSET + 8;

    Ok(DepositIndex::from_le_bytes(
        bytes[payload_range]
            .try_into()
            .expect("length is checked above"),
    ))
}
