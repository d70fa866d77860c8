use core::ops::Range;

use anyhow::{ensure, Error as AnyhowError};
use hex_literal::hex;
use thiserror::Error;
use types::phase0::{
    containers::DepositData,
    primitives::{DepositIndex, PublicKeyBytes, SignatureBytes, H256},
};
use web3::types::Log;

// The deposit contract ABI-encodes every `DepositEvent` field as dynamic
// `bytes` even though all of them are fixed in size, so a log consists of
// 18 EVM words: 5 offset words, then a length word and zero-padded payload
// for each field. `pubkey`, `withdrawal_credentials`, `amount`, `signature`
// and `index` land at fixed positions; `amount` and `index` are 8 bytes,
// little-endian.
//
// See:
// - <https://github.com/ethereum/consensus-specs/blob/fab27d17f0dd289a6abbb99acae39387ac2320cf/solidity_deposit_contract/deposit_contract.sol>
// - <https://docs.soliditylang.org/en/v0.8.2/abi-spec.html>

const EVM_WORD_SIZE: usize = 32;
const DATA_LENGTH: usize = 18 * EVM_WORD_SIZE;

const fn payload(word: usize, size: usize) -> Range<usize> {
    word * EVM_WORD_SIZE..word * EVM_WORD_SIZE + size
}

const PUBKEY_RANGE: Range<usize> = payload(6, 48);
const WITHDRAWAL_CREDENTIALS_RANGE: Range<usize> = payload(9, 32);
const AMOUNT_RANGE: Range<usize> = payload(11, 8);
const SIGNATURE_RANGE: Range<usize> = payload(13, 96);
const INDEX_RANGE: Range<usize> = payload(17, 8);

#[derive(Debug, Error)]
enum Error {
    #[error("log has unexpected topics: {log:?}")]
    UnexpectedTopics { log: Log },
    #[error("log has been removed: {log:?}")]
    Removed { log: Log },
    #[error("log data has the wrong length: {log:?}")]
    WrongLength { log: Log },
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(test, derive(PartialEq, Eq, Default))]
pub struct DepositEvent {
    pub data: DepositData,
    pub index: DepositIndex,
}

impl TryFrom<Log> for DepositEvent {
    type Error = AnyhowError;

    fn try_from(log: Log) -> Result<Self, Self::Error> {
        ensure!(log.topics == [Self::TOPIC], Error::UnexpectedTopics { log });

        ensure!(!log.is_removed(), Error::Removed { log });

        let log_data = log.data.0.as_slice();

        ensure!(log_data.len() == DATA_LENGTH, Error::WrongLength { log });

        let pubkey = PublicKeyBytes::from_slice(&log_data[PUBKEY_RANGE]);

        let withdrawal_credentials = H256::from_slice(&log_data[WITHDRAWAL_CREDENTIALS_RANGE]);

        let amount = u64::from_le_bytes(
            log_data[AMOUNT_RANGE]
                .try_into()
                .expect("length is checked above"),
        );

        let signature = SignatureBytes::from_slice(&log_data[SIGNATURE_RANGE]);

        let index = DepositIndex::from_le_bytes(
            log_data[INDEX_RANGE]
                .try_into()
                .expect("length is checked above"),
        );

        Ok(Self {
            data: DepositData {
                pubkey,
                withdrawal_credentials,
                amount,
                signature,
            },
            index,
        })
    }
}

impl DepositEvent {
    /// Keccak-256 hash of `DepositEvent(bytes,bytes,bytes,bytes,bytes)`.
    pub const TOPIC: H256 = H256(hex!(
        "649bbc62d0e31342afea4e5cd82d4049e7e1ee912fc0889aa790803be39038c5"
    ));

    pub const LENGTH: usize = DATA_LENGTH;
}
