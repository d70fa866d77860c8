use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use types::phase0::primitives::{
    ChainId, ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber, H256,
};
use web3::types::{BlockId, BlockNumber, Filter, Log, U64};

use crate::eth1_block::Eth1Block;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no Eth1 RPC endpoints provided")]
    NoEndpointsProvided,
    #[error("all Eth1 RPC endpoints returned errors")]
    EndpointsExhausted,
}

/// The capability the watcher consumes to read the execution chain.
///
/// Read methods surface transient failures to the caller; retrying is the
/// caller's decision. The subscription streams yield until dropped and
/// report per-item errors inline rather than ending the stream, so a flaky
/// connection shows up as error items, not as a silently dead subscription.
#[async_trait]
pub trait Eth1Provider: Send + Sync {
    async fn chain_id(&self) -> Result<ChainId>;

    async fn get_block(&self, block_id: BlockId) -> Result<Option<Eth1Block>>;

    async fn get_logs(&self, filter: Filter) -> Result<Vec<Log>>;

    async fn get_code(&self, address: ExecutionAddress) -> Result<Vec<u8>>;

    /// `eth_call` against `address` with the given calldata, at the given
    /// block (defaults to the latest).
    async fn call_at_block(
        &self,
        address: ExecutionAddress,
        calldata: Vec<u8>,
        block_id: Option<BlockId>,
    ) -> Result<Vec<u8>>;

    fn new_heads(&self) -> BoxStream<'_, Result<Eth1Block>>;

    fn deposit_logs(
        &self,
        address: ExecutionAddress,
        topic: H256,
    ) -> BoxStream<'_, Result<Log>>;

    async fn get_block_by_number(
        &self,
        block_number: ExecutionBlockNumber,
    ) -> Result<Option<Eth1Block>> {
        self.get_block(U64::from(block_number).into()).await
    }

    async fn get_block_by_hash(
        &self,
        block_hash: ExecutionBlockHash,
    ) -> Result<Option<Eth1Block>> {
        self.get_block(block_hash.into()).await
    }

    async fn get_latest_block(&self) -> Result<Option<Eth1Block>> {
        self.get_block(BlockNumber::Latest.into()).await
    }
}
