pub use crate::{
    deposit_contract::{DepositContract, Error as DepositContractError},
    deposit_event::DepositEvent,
    eth1_block::Eth1Block,
    eth1_rpc::Eth1Rpc,
    provider::{Eth1Provider, ProviderError},
};

mod deposit_contract;
mod deposit_event;
mod endpoints;
mod eth1_block;
mod eth1_rpc;
mod provider;
