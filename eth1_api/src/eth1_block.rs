use anyhow::{bail, Error as AnyhowError, Result};
use thiserror::Error;
use types::phase0::primitives::{
    ExecutionBlockHash, ExecutionBlockNumber, UnixSeconds, H256,
};
use web3::types::{Block, U64};

#[derive(Debug, Error)]
enum Error {
    #[error("RPC returned block without hash: {block:?}")]
    MissingHash { block: Block<H256> },
    #[error("RPC returned block without number: {block:?}")]
    MissingNumber { block: Block<H256> },
}

/// The slice of an execution-chain block header that `Eth1Data` voting
/// needs. Immutable once observed.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Eth1Block {
    pub hash: ExecutionBlockHash,
    pub number: ExecutionBlockNumber,
    pub timestamp: UnixSeconds,
}

impl TryFrom<Block<H256>> for Eth1Block {
    type Error = AnyhowError;

    fn try_from(block: Block<H256>) -> Result<Self, Self::Error> {
        let Block {
            hash,
            number,
            timestamp,
            ..
        } = block;

        // Pending blocks come back without a hash or number.
        let Some(hash) = hash else {
            bail!(Error::MissingHash { block });
        };

        let Some(number) = number.as_ref().map(U64::as_u64) else {
            bail!(Error::MissingNumber { block });
        };

        // `<U256 as TryInto<u64>>::Error` is `&'static str`.
        let timestamp = timestamp.try_into().map_err(AnyhowError::msg)?;

        Ok(Self {
            hash,
            number,
            timestamp,
        })
    }
}
