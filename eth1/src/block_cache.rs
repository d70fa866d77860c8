use eth1_api::Eth1Block;
use thiserror::Error;
use types::phase0::primitives::{ExecutionBlockNumber, UnixSeconds};

#[derive(Debug, Error)]
pub enum Error {
    #[error("blocks must be strictly increasing by number and non-decreasing by timestamp")]
    InvalidOrder,
    #[error("block {number} cannot be inserted after block {tip}")]
    OutOfOrderInsert {
        number: ExecutionBlockNumber,
        tip: ExecutionBlockNumber,
    },
}

/// Sliding window of execution-chain blocks usable as `Eth1Data` vote
/// candidates.
///
/// Blocks are stored in ascending order of number, which also keeps them
/// in ascending order of timestamp. The cache tracks the most recently
/// observed chain head separately from its own tip: the tip is the newest
/// block the cache holds, the head is the newest block the chain has.
#[derive(Default)]
pub struct BlockCache {
    blocks: Vec<Eth1Block>,
    head: Option<Eth1Block>,
}

impl BlockCache {
    /// Bulk-loads the cache, replacing its previous contents.
    pub fn init(
        &mut self,
        blocks: Vec<Eth1Block>,
        head: Eth1Block,
    ) -> Result<(), Error> {
        let ordered = blocks.windows(2).all(|pair| {
            pair[0].number < pair[1].number && pair[0].timestamp <= pair[1].timestamp
        });

        if !ordered {
            return Err(Error::InvalidOrder);
        }

        self.blocks = blocks;
        self.head = Some(head);

        Ok(())
    }

    #[must_use]
    pub fn has_block(&self, block: &Eth1Block) -> bool {
        self.blocks
            .binary_search_by_key(&block.number, |cached| cached.number)
            .is_ok()
    }

    /// Appends one block. The caller is responsible for having backfilled
    /// any gap below it first.
    pub fn add_block(&mut self, block: Eth1Block) -> Result<(), Error> {
        if let Some(tip) = self.blocks.last() {
            if block.number != tip.number + 1 || block.timestamp < tip.timestamp {
                return Err(Error::OutOfOrderInsert {
                    number: block.number,
                    tip: tip.number,
                });
            }
        }

        self.blocks.push(block);

        Ok(())
    }

    /// Evicts every block whose timestamp is strictly older than
    /// `timestamp`. The current head block survives regardless of age so
    /// that at least one candidate always remains.
    pub fn prune(&mut self, timestamp: UnixSeconds) {
        let head_number = self.head.map(|head| head.number);

        self.blocks
            .retain(|block| block.timestamp >= timestamp || Some(block.number) == head_number);
    }

    /// Blocks whose timestamp lies in `[from_time, to_time]`, ascending by
    /// number. Open-ended bounds default to the cache's extremes.
    #[must_use]
    pub fn find_blocks_by_timestamp(
        &self,
        from_time: Option<UnixSeconds>,
        to_time: Option<UnixSeconds>,
    ) -> Vec<Eth1Block> {
        self.blocks
            .iter()
            .filter(|block| {
                from_time.map_or(true, |from| from <= block.timestamp)
                    && to_time.map_or(true, |to| block.timestamp <= to)
            })
            .copied()
            .collect()
    }

    /// Records the observed head and returns the number of the next block
    /// needed to close the gap between the cache tip and the head, if any.
    pub fn request_new_block(
        &mut self,
        head: Eth1Block,
    ) -> Option<ExecutionBlockNumber> {
        self.head = Some(head);

        let Some(tip) = self.blocks.last() else {
            return Some(head.number);
        };

        (head.number > tip.number).then(|| tip.number + 1)
    }

    #[must_use]
    pub fn tip(&self) -> Option<&Eth1Block> {
        self.blocks.last()
    }

    #[must_use]
    pub fn head(&self) -> Option<&Eth1Block> {
        self.head.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;
    use test_case::test_case;
    use types::phase0::primitives::H256;

    use super::*;

    fn block(number: ExecutionBlockNumber, timestamp: UnixSeconds) -> Eth1Block {
        Eth1Block {
            hash: H256::from_low_u64_be(number),
            number,
            timestamp,
        }
    }

    // Blocks numbered 100 through 110 with timestamps 1000 through 1100.
    fn populated_cache() -> BlockCache {
        let blocks = (0..=10)
            .map(|offset| block(100 + offset, 1000 + offset * 10))
            .collect();

        let mut cache = BlockCache::default();

        cache
            .init(blocks, block(110, 1100))
            .expect("blocks are ordered");

        cache
    }

    #[test]
    fn init_rejects_unordered_blocks() {
        let mut cache = BlockCache::default();

        let error = cache
            .init(vec![block(101, 1010), block(100, 1000)], block(101, 1010))
            .expect_err("blocks are not ordered by number");

        assert!(matches!(error, Error::InvalidOrder));
    }

    #[test]
    fn has_block_matches_by_number() {
        let cache = populated_cache();

        assert!(cache.has_block(&block(105, 1050)));
        assert!(!cache.has_block(&block(111, 1110)));
    }

    #[test]
    fn add_block_accepts_the_next_number() {
        let mut cache = populated_cache();

        cache
            .add_block(block(111, 1110))
            .expect("111 directly follows the tip");

        assert_eq!(cache.tip().map(|tip| tip.number), Some(111));
    }

    #[test_case(113, 1130; "skipping a number")]
    #[test_case(110, 1100; "repeating the tip")]
    #[test_case(112, 1000; "regressing in time")]
    fn add_block_rejects(number: ExecutionBlockNumber, timestamp: UnixSeconds) {
        let mut cache = populated_cache();

        if number == 112 {
            cache
                .add_block(block(111, 1110))
                .expect("111 directly follows the tip");
        }

        let error = cache
            .add_block(block(number, timestamp))
            .expect_err("insert is out of order");

        assert!(matches!(error, Error::OutOfOrderInsert { .. }));
    }

    #[test]
    fn find_blocks_by_timestamp_returns_the_inclusive_range() {
        let cache = populated_cache();

        let found = cache.find_blocks_by_timestamp(Some(1020), Some(1060));

        assert_eq!(
            found.iter().map(|block| block.number).collect::<Vec<_>>(),
            [102, 103, 104, 105, 106],
        );
    }

    #[test]
    fn find_blocks_by_timestamp_defaults_to_the_whole_cache() {
        let cache = populated_cache();

        assert_eq!(cache.find_blocks_by_timestamp(None, None).len(), 11);
        assert!(cache
            .find_blocks_by_timestamp(Some(2000), None)
            .is_empty());
    }

    #[test]
    fn prune_removes_exactly_the_older_blocks() {
        let mut cache = populated_cache();

        cache.prune(1050);

        assert_eq!(
            cache
                .find_blocks_by_timestamp(None, None)
                .iter()
                .map(|block| block.number)
                .collect::<Vec<_>>(),
            [105, 106, 107, 108, 109, 110],
        );
    }

    #[test]
    fn prune_never_removes_the_head() {
        let mut cache = populated_cache();

        cache.prune(5000);

        assert_eq!(
            cache
                .find_blocks_by_timestamp(None, None)
                .iter()
                .map(|block| block.number)
                .collect::<Vec<_>>(),
            [110],
        );
    }

    #[test]
    fn request_new_block_closes_gaps_from_the_tip() {
        let mut cache = populated_cache();

        assert_eq!(cache.request_new_block(block(110, 1100)), None);
        assert_eq!(cache.request_new_block(block(109, 1090)), None);
        assert_eq!(cache.request_new_block(block(115, 1150)), Some(111));
    }

    #[quickcheck]
    fn blocks_stay_ordered_after_random_inserts_and_prunes(operations: Vec<(bool, u8)>) -> bool {
        let mut cache = populated_cache();

        for (insert, parameter) in operations {
            if insert {
                let tip = cache.tip().copied().unwrap_or_else(|| block(100, 1000));

                let _ = cache.add_block(block(
                    tip.number + 1,
                    tip.timestamp + u64::from(parameter % 20),
                ));
            } else {
                cache.prune(1000 + u64::from(parameter) * 10);
            }
        }

        let blocks = cache.find_blocks_by_timestamp(None, None);

        blocks.windows(2).all(|pair| {
            pair[0].number < pair[1].number && pair[0].timestamp <= pair[1].timestamp
        })
    }
}
