use serde::{Deserialize, Serialize};

use crate::phase0::{
    containers::{Checkpoint, Eth1Data},
    primitives::{Slot, UnixSeconds},
};

/// Read-only projection of a beacon state.
///
/// The full state lives with the consensus runtime. This bridge only ever
/// reads the fields involved in `Eth1Data` voting and cache pruning, so
/// callers hand it a snapshot rather than the state itself.
#[derive(Clone, Default, Debug, Deserialize, Serialize)]
pub struct BeaconState {
    pub genesis_time: UnixSeconds,
    pub slot: Slot,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: Vec<Eth1Data>,
    pub finalized_checkpoint: Checkpoint,
}
