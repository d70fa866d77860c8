//! [`Eth1Data`] vote selection and the voting-period arithmetic behind it.
//!
//! Everything here is deterministic: two nodes holding the same cached
//! blocks and the same beacon state snapshot derive the same vote, which
//! is what lets a majority of honest proposers converge on one
//! `Eth1Data` within a voting period.

use core::ops::Range;
use std::collections::HashMap;

use eth1_api::Eth1Block;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::Eth1Data,
        primitives::{ExecutionBlockNumber, Slot, UnixSeconds},
    },
};

/// [`compute_timestamp_at_slot`](https://github.com/ethereum/consensus-specs/blob/9839ed49346a85f95af4f8b0cb9c4d98b2308af8/specs/bellatrix/beacon-chain.md#compute_timestamp_at_slot)
#[must_use]
pub fn compute_timestamp_at_slot(config: &Config, state: &BeaconState, slot: Slot) -> UnixSeconds {
    let slots_since_genesis = slot - GENESIS_SLOT;
    state.genesis_time + slots_since_genesis * config.seconds_per_slot.get()
}

/// [`voting_period_start_time`](https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/validator.md#eth1-data)
#[must_use]
pub fn voting_period_start_time(config: &Config, state: &BeaconState) -> UnixSeconds {
    let period = config.slots_per_eth1_voting_period();
    let eth1_voting_period_start_slot = state.slot - state.slot % period;
    compute_timestamp_at_slot(config, state, eth1_voting_period_start_slot)
}

/// [`is_candidate_block`](https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/validator.md#eth1-data)
#[must_use]
pub fn is_candidate_block(config: &Config, block: &Eth1Block, period_start: UnixSeconds) -> bool {
    let range_width = config.eth1_vote_range_width();
    let low = block.timestamp + range_width;
    let high = block.timestamp + range_width * 2;
    (low..=high).contains(&period_start)
}

/// Oldest timestamp any candidate for the given state's voting period (or
/// a later one) can have. Blocks older than this are safe to prune once
/// the state is finalized.
#[must_use]
pub fn earliest_candidate_timestamp(config: &Config, state: &BeaconState) -> UnixSeconds {
    voting_period_start_time(config, state).saturating_sub(config.eth1_vote_range_width() * 2)
}

/// Block-number range to bulk-load at startup, estimated from the head
/// block's timestamp at one block per `SECONDS_PER_ETH1_BLOCK`. The range
/// extends through the head so that the freshly initialized cache is
/// contiguous with incoming head updates.
#[must_use]
pub fn candidate_block_number_range(
    config: &Config,
    state: &BeaconState,
    head: &Eth1Block,
) -> Range<ExecutionBlockNumber> {
    let earliest_timestamp = earliest_candidate_timestamp(config, state);
    let seconds_behind = head.timestamp.saturating_sub(earliest_timestamp);
    let blocks_behind = seconds_behind / config.seconds_per_eth1_block.max(1);

    let from = head
        .number
        .saturating_sub(blocks_behind)
        .max(config.deposit_contract_deploy_block);

    from..head.number + 1
}

/// [`get_eth1_vote`](https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/validator.md#eth1-data)
///
/// `candidates` pairs each eligible cached block with the `Eth1Data` the
/// deposit contract reported at it. Votes already cast in the state count
/// only when they match a candidate, so the result can never cite a block
/// outside the eligible window. With no candidates at all the state's
/// current `Eth1Data` is kept, which keeps block production going through
/// an Eth1 outage.
#[must_use]
pub fn select_vote(state: &BeaconState, candidates: &[(Eth1Block, Eth1Data)]) -> Eth1Data {
    let mut tally = HashMap::<Eth1Data, (usize, ExecutionBlockNumber)>::new();

    for (block, eth1_data) in candidates {
        let (count, greatest_number) = tally.entry(*eth1_data).or_insert((0, block.number));
        *count += 1;
        *greatest_number = (*greatest_number).max(block.number);
    }

    for vote in &state.eth1_data_votes {
        if let Some((count, _)) = tally.get_mut(vote) {
            *count += 1;
        }
    }

    tally
        .into_iter()
        .max_by_key(|(_, (count, greatest_number))| (*count, *greatest_number))
        .map(|(eth1_data, _)| eth1_data)
        .unwrap_or(state.eth1_data)
}
