pub use eth1_api::{DepositEvent, Eth1Block};

pub use crate::{
    block_cache::{BlockCache, Error as BlockCacheError},
    eth1_watcher::{Error as Eth1WatcherError, Eth1Watcher},
    events::{EventChannel, Subscription},
    retry::{retryable, Error as RetryError},
};

pub mod eth1_vote;

mod block_cache;
mod eth1_watcher;
mod events;
mod retry;
