use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, ensure, Result};
use eth1_api::{DepositContract, DepositEvent, Eth1Block, Eth1Provider};
use futures::StreamExt as _;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::task::JoinHandle;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{DepositData, Eth1Data},
        primitives::{DepositIndex, ExecutionAddress, ExecutionBlockNumber, UnixSeconds, H256},
    },
};
use web3::types::{BlockId, BlockNumber, FilterBuilder, Log, U64};

use crate::{
    block_cache::BlockCache,
    eth1_vote,
    events::{EventChannel, Subscription},
    retry,
};

const GET_ETH1_BLOCK_RETRY: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("the Eth1 watcher is already running")]
    AlreadyRunning,
    #[error("the deposit contract has not been resolved yet")]
    ContractNotResolved,
}

/// Watches the execution chain for new blocks and deposit logs.
///
/// One watcher instance runs per process. It owns the candidate block
/// cache, keeps it contiguous with the chain head, and fans observed
/// blocks and decoded deposits out to subscribers. Everything it learns
/// is rederivable from the chain, so none of its state survives a
/// restart.
pub struct Eth1Watcher<P: Eth1Provider> {
    config: Arc<Config>,
    provider: Arc<P>,
    contract: Mutex<Option<DepositContract>>,
    cache: RwLock<BlockCache>,
    state: Mutex<State>,
    stopped: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    block_events: EventChannel<Eth1Block>,
    deposit_events: EventChannel<(DepositIndex, DepositData)>,
}

impl<P: Eth1Provider + 'static> Eth1Watcher<P> {
    #[must_use]
    pub fn new(config: Arc<Config>, provider: Arc<P>, contract: Option<DepositContract>) -> Self {
        Self {
            config,
            provider,
            contract: Mutex::new(contract),
            cache: RwLock::new(BlockCache::default()),
            state: Mutex::new(State::Stopped),
            stopped: AtomicBool::new(false),
            tasks: Mutex::new(vec![]),
            block_events: EventChannel::default(),
            deposit_events: EventChannel::default(),
        }
    }

    /// Resolves the deposit contract if it was not supplied up front and
    /// subscribes to head and deposit notifications. Fails without side
    /// effects: a watcher whose `start` failed is still stopped.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.lock_state();
            ensure!(*state == State::Stopped, Error::AlreadyRunning);
            *state = State::Starting;
        }

        self.stopped.store(false, Ordering::Release);

        let existing_contract = *self
            .contract
            .lock()
            .expect("deposit contract mutex is poisoned");

        let contract = match existing_contract {
            Some(contract) => contract,
            None => match DepositContract::resolve(self.provider.as_ref(), &self.config).await {
                Ok(contract) => contract,
                Err(error) => {
                    *self.lock_state() = State::Stopped;
                    return Err(error);
                }
            },
        };

        *self
            .contract
            .lock()
            .expect("deposit contract mutex is poisoned") = Some(contract);

        let watcher = Arc::clone(self);
        let head_task = tokio::spawn(async move { watcher.run_head_subscription().await });

        let watcher = Arc::clone(self);
        let deposit_task =
            tokio::spawn(async move { watcher.run_deposit_subscription(contract.address).await });

        self.tasks
            .lock()
            .expect("task list mutex is poisoned")
            .extend([head_task, deposit_task]);

        match self.provider.chain_id().await {
            Ok(chain_id) => info!("started listening for Eth1 events on chain {chain_id}"),
            Err(error) => warn!("could not read the Eth1 chain id: {error}"),
        }

        *self.lock_state() = State::Running;

        Ok(())
    }

    /// Unsubscribes from both event sources. Safe to call at any point,
    /// including before `start` and repeatedly.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();

            if *state == State::Stopped {
                return;
            }

            *state = State::Stopping;
        }

        self.stopped.store(true, Ordering::Release);

        for task in self
            .tasks
            .lock()
            .expect("task list mutex is poisoned")
            .drain(..)
        {
            task.abort();
        }

        *self.lock_state() = State::Stopped;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.lock_state() == State::Running
    }

    pub fn subscribe_to_blocks(&self) -> Subscription<Eth1Block> {
        self.block_events.subscribe()
    }

    pub fn subscribe_to_deposits(&self) -> Subscription<(DepositIndex, DepositData)> {
        self.deposit_events.subscribe()
    }

    /// Computes the voting-eligible block range from the supplied state,
    /// fetches it concurrently and bulk-loads the cache.
    pub async fn init_block_cache(&self, state: &BeaconState) -> Result<()> {
        let head = self.get_head().await?;
        let block_number_range = eth1_vote::candidate_block_number_range(&self.config, state, &head);

        info!(
            "initializing the Eth1 block cache from block {} to block {}",
            block_number_range.start,
            block_number_range.end.saturating_sub(1),
        );

        let blocks = futures::future::try_join_all(
            block_number_range.map(|block_number| self.provider.get_block_by_number(block_number)),
        )
        .await?;

        let blocks = blocks.into_iter().flatten().collect();

        self.lock_cache_mut().init(blocks, head).map_err(Into::into)
    }

    /// Called on every new finalized checkpoint. Blocks too old to be
    /// cited by any vote from the finalized period on are dropped.
    pub fn prune_block_cache(&self, finalized_state: &BeaconState) {
        let timestamp = eth1_vote::earliest_candidate_timestamp(&self.config, finalized_state);

        self.lock_cache_mut().prune(timestamp);
    }

    /// Cached blocks eligible as vote candidates for the voting period
    /// starting at `period_start`.
    #[must_use]
    pub fn find_blocks(&self, period_start: UnixSeconds) -> Vec<Eth1Block> {
        self.lock_cache()
            .find_blocks_by_timestamp(None, None)
            .into_iter()
            .filter(|block| eth1_vote::is_candidate_block(&self.config, block, period_start))
            .collect()
    }

    /// Derives the `Eth1Data` to include in a block proposed on top of
    /// `state`. Never fails: candidates whose contract reads fail are
    /// skipped, and with no candidates the state's current vote is kept.
    pub async fn get_eth1_vote(&self, state: &BeaconState) -> Eth1Data {
        let period_start = eth1_vote::voting_period_start_time(&self.config, state);
        let candidate_blocks = self.find_blocks(period_start);

        let mut candidates = Vec::with_capacity(candidate_blocks.len());

        for block in candidate_blocks {
            match self.get_eth1_data(&block).await {
                Ok(eth1_data) => candidates.push((block, eth1_data)),
                Err(error) => warn!(
                    "failed to read Eth1 data at candidate block {}: {error}",
                    block.number,
                ),
            }
        }

        eth1_vote::select_vote(state, candidates.as_slice())
    }

    pub async fn get_eth1_data(&self, block: &Eth1Block) -> Result<Eth1Data> {
        let block_id = BlockId::Hash(block.hash);

        let (deposit_root, deposit_count) = futures::try_join!(
            self.deposit_root(Some(block_id)),
            self.deposit_count(Some(block_id)),
        )?;

        Ok(Eth1Data {
            deposit_root,
            deposit_count,
            block_hash: block.hash,
        })
    }

    pub async fn get_head(&self) -> Result<Eth1Block> {
        self.provider
            .get_latest_block()
            .await?
            .ok_or_else(|| anyhow!("the Eth1 chain has no head block"))
    }

    pub async fn get_block(&self, block_id: BlockId) -> Result<Option<Eth1Block>> {
        self.provider.get_block(block_id).await
    }

    pub async fn deposit_root(&self, block_id: Option<BlockId>) -> Result<H256> {
        self.resolved_contract()?
            .deposit_root(self.provider.as_ref(), block_id)
            .await
    }

    pub async fn deposit_count(&self, block_id: Option<BlockId>) -> Result<DepositIndex> {
        self.resolved_contract()?
            .deposit_count(self.provider.as_ref(), block_id)
            .await
    }

    /// Replays historical deposit logs in ascending index order, emitting
    /// one `deposit` event per log. `from_block` defaults to the block
    /// the contract was deployed at, `to_block` to the latest block.
    pub async fn process_past_deposits(
        &self,
        from_block: Option<ExecutionBlockNumber>,
        to_block: Option<ExecutionBlockNumber>,
    ) -> Result<()> {
        let contract = self.resolved_contract()?;

        let from_block = from_block.unwrap_or(contract.deploy_block);
        let to_block = to_block.map_or(BlockNumber::Latest, |number| U64::from(number).into());

        let filter = FilterBuilder::default()
            .from_block(U64::from(from_block).into())
            .to_block(to_block)
            .address(vec![contract.address])
            .topics(Some(vec![DepositEvent::TOPIC]), None, None, None)
            .build();

        let logs = self.provider.get_logs(filter).await?;

        let mut past_deposits = logs
            .into_iter()
            .map(DepositEvent::try_from)
            .collect::<Result<Vec<_>>>()?;

        past_deposits.sort_by_key(|deposit_event| deposit_event.index);

        for DepositEvent { data, index } in past_deposits {
            self.deposit_events.publish(&(index, data));
        }

        Ok(())
    }

    /// Handles one observed head block: fans it out to subscribers, then
    /// fetches at most one block towards closing the gap between the
    /// cache tip and the head. Retry failures are logged and swallowed so
    /// a flaky provider only ever makes the cache fall behind.
    pub async fn process_block_head_update(&self, head: Eth1Block) {
        debug!("received Eth1 block {}", head.number);

        self.block_events.publish(&head);

        let requested_block_number = self.lock_cache_mut().request_new_block(head);

        let Some(starting_number) = requested_block_number else {
            return;
        };

        let thunks = (starting_number..)
            .take_while(|_| !self.stopped.load(Ordering::Acquire))
            .map(|block_number| move || self.provider.get_block_by_number(block_number));

        match retry::retryable(thunks, GET_ETH1_BLOCK_RETRY).await {
            Ok(block) => {
                if let Err(error) = self.lock_cache_mut().add_block(block) {
                    error!(
                        "failed to insert fetched Eth1 block {}: {error}",
                        block.number,
                    );
                }
            }
            Err(error) => error!("cannot find Eth1 block {starting_number}: {error}"),
        }
    }

    /// Decodes one raw deposit log and fans it out. A log that fails to
    /// decode is dropped; the subscription stays up.
    pub fn process_deposit_log(&self, log: Log) {
        match DepositEvent::try_from(log) {
            Ok(DepositEvent { data, index }) => {
                info!("received validator deposit event index={index}");
                self.deposit_events.publish(&(index, data));
            }
            Err(error) => warn!("failed to process deposit log: {error}"),
        }
    }

    async fn run_head_subscription(self: Arc<Self>) {
        let mut heads = self.provider.new_heads();

        while let Some(head) = heads.next().await {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }

            match head {
                Ok(block) => self.process_block_head_update(block).await,
                Err(error) => warn!("Eth1 head subscription returned an error: {error}"),
            }
        }
    }

    async fn run_deposit_subscription(self: Arc<Self>, address: ExecutionAddress) {
        let mut logs = self.provider.deposit_logs(address, DepositEvent::TOPIC);

        while let Some(log) = logs.next().await {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }

            match log {
                Ok(log) => self.process_deposit_log(log),
                Err(error) => warn!("Eth1 deposit subscription returned an error: {error}"),
            }
        }
    }

    fn resolved_contract(&self) -> Result<DepositContract> {
        let contract = *self
            .contract
            .lock()
            .expect("deposit contract mutex is poisoned");

        contract.ok_or(Error::ContractNotResolved).map_err(Into::into)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("watcher state mutex is poisoned")
    }

    fn lock_cache(&self) -> std::sync::RwLockReadGuard<'_, BlockCache> {
        self.cache.read().expect("block cache lock is poisoned")
    }

    fn lock_cache_mut(&self) -> std::sync::RwLockWriteGuard<'_, BlockCache> {
        self.cache.write().expect("block cache lock is poisoned")
    }
}
