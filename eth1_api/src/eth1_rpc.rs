use core::time::Duration;
use std::collections::VecDeque;

use anyhow::{bail, ensure, Result};
use async_trait::async_trait;
use futures::{lock::Mutex, stream::BoxStream, Future, StreamExt as _};
use log::warn;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use types::phase0::primitives::{ChainId, ExecutionAddress, ExecutionBlockNumber, H256};
use url::Url;
use web3::{
    api::Eth,
    helpers::CallFuture,
    transports::Http,
    types::{BlockId, Bytes, CallRequest, Filter, FilterBuilder, Log, U64},
    Error as Web3Error, Web3,
};

use crate::{
    endpoints::Endpoints,
    eth1_block::Eth1Block,
    provider::{Eth1Provider, ProviderError},
};

const HEAD_POLL_INTERVAL: Duration = Duration::from_secs(5);
const LOG_POLL_INTERVAL: Duration = Duration::from_secs(14);

/// JSON-RPC-over-HTTP implementation of [`Eth1Provider`].
///
/// Subscriptions are implemented by polling. Execution clients expose push
/// subscriptions only over WebSocket or IPC transports; polling over HTTP
/// works against every endpoint, including hosted ones.
pub struct Eth1Rpc {
    client: Client,
    endpoints: Mutex<Endpoints>,
}

impl Eth1Rpc {
    #[must_use]
    pub fn new(client: Client, eth1_rpc_urls: Vec<Url>) -> Self {
        Self {
            client,
            endpoints: Mutex::new(Endpoints::new(eth1_rpc_urls)),
        }
    }

    pub async fn current_head_number(&self) -> Result<ExecutionBlockNumber> {
        Ok(self
            .request_with_fallback(|api| api.block_number())
            .await?
            .as_u64())
    }

    async fn request_with_fallback<R, O, F>(&self, request_from_api: R) -> Result<O>
    where
        R: Fn(Eth<Http>) -> CallFuture<O, F> + Send + Sync,
        O: DeserializeOwned + Send,
        F: Future<Output = Result<Value, Web3Error>> + Send,
    {
        while let Some(url) = self.current_endpoint().await {
            let http = Http::with_client(self.client.clone(), url.clone());
            let api = Web3::new(http).eth();

            match request_from_api(api).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    match self.peek_next_endpoint().await {
                        Some(next_url) => warn!(
                            "Eth1 RPC endpoint {url} returned an error: {error}; \
                             switching to {next_url}",
                        ),
                        None => warn!(
                            "last available Eth1 RPC endpoint {url} returned an error: {error}",
                        ),
                    }

                    self.advance_endpoint().await;
                }
            }
        }

        self.reset_endpoints().await;

        // Checking this in `Eth1Rpc::new` would be unnecessarily strict.
        // A node that only syncs never needs an Eth1 RPC.
        ensure!(
            !self.endpoints.lock().await.is_empty(),
            ProviderError::NoEndpointsProvided,
        );

        bail!(ProviderError::EndpointsExhausted)
    }

    async fn current_endpoint(&self) -> Option<Url> {
        self.endpoints.lock().await.current().cloned()
    }

    async fn peek_next_endpoint(&self) -> Option<Url> {
        self.endpoints.lock().await.peek_next().cloned()
    }

    async fn advance_endpoint(&self) {
        self.endpoints.lock().await.advance();
    }

    async fn reset_endpoints(&self) {
        self.endpoints.lock().await.reset();
    }
}

#[async_trait]
impl Eth1Provider for Eth1Rpc {
    async fn chain_id(&self) -> Result<ChainId> {
        Ok(self
            .request_with_fallback(|api| api.chain_id())
            .await?
            .as_u64())
    }

    async fn get_block(&self, block_id: BlockId) -> Result<Option<Eth1Block>> {
        self.request_with_fallback(|api| api.block(block_id))
            .await?
            .map(Eth1Block::try_from)
            .transpose()
    }

    async fn get_logs(&self, filter: Filter) -> Result<Vec<Log>> {
        self.request_with_fallback(|api| api.logs(filter.clone()))
            .await
    }

    async fn get_code(&self, address: ExecutionAddress) -> Result<Vec<u8>> {
        Ok(self
            .request_with_fallback(|api| api.code(address, None))
            .await?
            .0)
    }

    async fn call_at_block(
        &self,
        address: ExecutionAddress,
        calldata: Vec<u8>,
        block_id: Option<BlockId>,
    ) -> Result<Vec<u8>> {
        let request = CallRequest {
            to: Some(address),
            data: Some(Bytes(calldata)),
            ..CallRequest::default()
        };

        Ok(self
            .request_with_fallback(|api| api.call(request.clone(), block_id))
            .await?
            .0)
    }

    fn new_heads(&self) -> BoxStream<'_, Result<Eth1Block>> {
        let last_seen = None::<ExecutionBlockNumber>;

        futures::stream::unfold(last_seen, move |mut last_seen| async move {
            loop {
                match self.get_latest_block().await {
                    Ok(Some(block)) if last_seen != Some(block.number) => {
                        last_seen = Some(block.number);
                        return Some((Ok(block), last_seen));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tokio::time::sleep(HEAD_POLL_INTERVAL).await;
                        return Some((Err(error), last_seen));
                    }
                }

                tokio::time::sleep(HEAD_POLL_INTERVAL).await;
            }
        })
        .boxed()
    }

    fn deposit_logs(
        &self,
        address: ExecutionAddress,
        topic: H256,
    ) -> BoxStream<'_, Result<Log>> {
        let state = (
            VecDeque::<Log>::new(),
            None::<ExecutionBlockNumber>,
        );

        futures::stream::unfold(state, move |(mut pending, mut next_from)| async move {
            loop {
                if let Some(log) = pending.pop_front() {
                    return Some((Ok(log), (pending, next_from)));
                }

                let head = match self.current_head_number().await {
                    Ok(number) => number,
                    Err(error) => {
                        tokio::time::sleep(LOG_POLL_INTERVAL).await;
                        return Some((Err(error), (pending, next_from)));
                    }
                };

                // The first poll anchors the subscription at the current
                // head. Historical logs are served by past-deposit replay.
                let from = next_from.unwrap_or(head);

                if from <= head {
                    let filter = FilterBuilder::default()
                        .from_block(U64::from(from).into())
                        .to_block(U64::from(head).into())
                        .address(vec![address])
                        .topics(Some(vec![topic]), None, None, None)
                        .build();

                    match self.get_logs(filter).await {
                        Ok(logs) => {
                            pending.extend(logs);
                            next_from = Some(head + 1);
                        }
                        Err(error) => {
                            tokio::time::sleep(LOG_POLL_INTERVAL).await;
                            return Some((Err(error), (pending, next_from)));
                        }
                    }

                    if !pending.is_empty() {
                        continue;
                    }
                }

                tokio::time::sleep(LOG_POLL_INTERVAL).await;
            }
        })
        .boxed()
    }
}
