use core::num::NonZeroU64;
use std::borrow::Cow;

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

use crate::phase0::primitives::{
    ChainId, ExecutionAddress, ExecutionBlockNumber, Gwei, Slot, H160,
};

/// Chain parameters customizable at runtime.
///
/// A strict subset of the [configurations in `consensus-specs`] — only the
/// variables the Eth1 bridge consumes, plus the two preset values
/// (`SLOTS_PER_EPOCH`, `EPOCHS_PER_ETH1_VOTING_PERIOD`) that the voting
/// period arithmetic needs. Deposit contract deployment data is folded in
/// here as well because every consumer of the contract address also needs
/// the deployment block.
///
/// [configurations in `consensus-specs`]: https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/configs
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Time parameters
    pub eth1_follow_distance: u64,
    pub seconds_per_eth1_block: u64,
    pub seconds_per_slot: NonZeroU64,
    pub slots_per_epoch: NonZeroU64,
    pub epochs_per_eth1_voting_period: NonZeroU64,

    // Validator cycle
    pub max_effective_balance: Gwei,

    // Deposit contract
    pub deposit_chain_id: ChainId,
    pub deposit_contract_address: ExecutionAddress,
    pub deposit_contract_deploy_block: ExecutionBlockNumber,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("mainnet"),

            // Time parameters
            eth1_follow_distance: 2048,
            seconds_per_eth1_block: 14,
            seconds_per_slot: nonzero!(12_u64),
            slots_per_epoch: nonzero!(32_u64),
            epochs_per_eth1_voting_period: nonzero!(64_u64),

            // Validator cycle
            max_effective_balance: 32_000_000_000,

            // Deposit contract
            deposit_chain_id: 1,
            deposit_contract_address: H160(hex!("00000000219ab540356cBB839Cbe05303d7705Fa")),
            deposit_contract_deploy_block: 11_052_984,
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            // Meta
            config_name: Cow::Borrowed("minimal"),

            // Time parameters
            eth1_follow_distance: 16,
            seconds_per_eth1_block: 14,
            seconds_per_slot: nonzero!(6_u64),
            slots_per_epoch: nonzero!(8_u64),
            epochs_per_eth1_voting_period: nonzero!(4_u64),

            // Validator cycle
            max_effective_balance: 32_000_000_000,

            // Deposit contract
            deposit_chain_id: 5,
            deposit_contract_address: H160(hex!("1234567890123456789012345678901234567890")),
            deposit_contract_deploy_block: 0,
        }
    }

    #[must_use]
    pub const fn slots_per_eth1_voting_period(&self) -> Slot {
        self.slots_per_epoch.get() * self.epochs_per_eth1_voting_period.get()
    }

    /// Width of the timestamp window a block must age through before it can
    /// be voted on. Half of the total candidate window.
    #[must_use]
    pub const fn eth1_vote_range_width(&self) -> u64 {
        self.seconds_per_eth1_block * self.eth1_follow_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_voting_period_spans_2048_slots() {
        assert_eq!(Config::mainnet().slots_per_eth1_voting_period(), 2048);
    }

    #[test]
    fn minimal_voting_period_spans_32_slots() {
        assert_eq!(Config::minimal().slots_per_eth1_voting_period(), 32);
    }

    #[test]
    fn configs_survive_serde_round_trips() {
        for config in [Config::mainnet(), Config::minimal()] {
            let json = serde_json::to_string(&config).expect("config should serialize");
            let deserialized =
                serde_json::from_str::<Config>(json.as_str()).expect("config should deserialize");

            assert_eq!(config.config_name, deserialized.config_name);
            assert_eq!(config.eth1_follow_distance, deserialized.eth1_follow_distance);
            assert_eq!(
                config.deposit_contract_address,
                deserialized.deposit_contract_address,
            );
        }
    }
}
