use std::collections::HashSet;

use crate::blocks::{Block, BlockHash};

/// Bounded view of the most recent distinct blocks for one network, newest first.
///
/// No two entries share a hash, entries are ordered by descending block number and there are never
/// more than `capacity` of them. When over capacity the oldest entries are dropped.
#[derive(Debug, Clone)]
pub struct BlockWindow {
    blocks: Vec<Block>,
    hash_index: HashSet<BlockHash>,
    capacity: usize,
}

impl BlockWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            blocks: Vec::with_capacity(capacity + 1),
            hash_index: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    fn trim_blocks(&mut self) {
        if self.blocks.len() <= self.capacity {
            return;
        }

        for evicted in self.blocks.split_off(self.capacity) {
            self.hash_index.remove(&evicted.hash);
        }
    }

    /// Inserts a block, returns whether the window changed. A known hash is a no-op, as is a block
    /// too old to make it into a full window.
    pub fn insert(&mut self, block: Block) -> bool {
        if self.hash_index.contains(&block.hash) {
            return false;
        }

        // Equal numbers keep arrival order, which only happens on reorgs.
        let index = self
            .blocks
            .partition_point(|stored| stored.number >= block.number);

        if index >= self.capacity {
            return false;
        }

        self.hash_index.insert(block.hash.clone());
        self.blocks.insert(index, block);
        self.trim_blocks();

        true
    }

    /// Inserts every block, returns whether the window changed.
    pub fn merge(&mut self, blocks: impl IntoIterator<Item = Block>) -> bool {
        blocks
            .into_iter()
            .fold(false, |changed, block| self.insert(block) || changed)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hash_index.contains(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&Block> {
        if !self.contains(hash) {
            return None;
        }

        self.blocks.iter().find(|block| block.hash == hash)
    }

    pub fn newest(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::blocks::tests::BlockBuilder;

    use super::*;

    fn numbers(window: &BlockWindow) -> Vec<u64> {
        window.blocks().iter().map(|block| block.number).collect()
    }

    fn assert_invariants(window: &BlockWindow) {
        assert!(window.len() <= window.capacity());

        let unique: HashSet<_> = window.blocks().iter().map(|block| &block.hash).collect();
        assert_eq!(unique.len(), window.len());

        assert!(window
            .blocks()
            .windows(2)
            .all(|pair| pair[0].number >= pair[1].number));
    }

    #[test]
    fn insert_keeps_newest_first_test() {
        let mut window = BlockWindow::new(10);

        for number in [5, 7, 6, 1, 9] {
            assert!(window.insert(BlockBuilder::numbered(number).build()));
        }

        assert_eq!(numbers(&window), vec![9, 7, 6, 5, 1]);
        assert_eq!(window.newest().unwrap().number, 9);
        assert_invariants(&window);
    }

    #[test]
    fn insert_known_hash_is_noop_test() {
        let mut window = BlockWindow::new(10);

        assert!(window.insert(BlockBuilder::numbered(1).build()));
        assert!(!window.insert(BlockBuilder::numbered(1).build()));

        assert_eq!(window.len(), 1);
    }

    #[test]
    fn insert_evicts_oldest_when_full_test() {
        let mut window = BlockWindow::new(3);

        window.merge((1..=3).map(|number| BlockBuilder::numbered(number).build()));
        assert!(window.insert(BlockBuilder::numbered(4).build()));

        assert_eq!(numbers(&window), vec![4, 3, 2]);
        assert!(!window.contains(&BlockBuilder::numbered(1).build().hash));
        assert_invariants(&window);
    }

    #[test]
    fn insert_too_old_into_full_window_test() {
        let mut window = BlockWindow::new(2);

        window.merge([10, 9].map(|number| BlockBuilder::numbered(number).build()));

        assert!(!window.insert(BlockBuilder::numbered(3).build()));
        assert_eq!(numbers(&window), vec![10, 9]);
        assert!(!window.contains(&BlockBuilder::numbered(3).build().hash));
    }

    #[test]
    fn same_number_different_hash_test() {
        let mut window = BlockWindow::new(10);

        window.insert(BlockBuilder::numbered(5).build());
        window.insert(BlockBuilder::new("uncle").with_number(5).build());

        assert_eq!(window.len(), 2);
        assert_invariants(&window);
    }

    #[test]
    fn merge_reports_change_test() {
        let mut window = BlockWindow::new(10);
        let blocks: Vec<_> = (1..=3)
            .map(|number| BlockBuilder::numbered(number).build())
            .collect();

        assert!(window.merge(blocks.clone()));
        assert!(!window.merge(blocks));
    }

    #[test]
    fn get_by_hash_test() {
        let mut window = BlockWindow::new(10);
        let block = BlockBuilder::numbered(8).build();
        window.insert(block.clone());

        assert_eq!(window.get(&block.hash), Some(&block));
        assert_eq!(window.get("0xmissing"), None);
    }

    #[test]
    fn invariants_hold_for_overlapping_merges_test() {
        let mut window = BlockWindow::new(10);

        // Simulates successive refreshes: each one sees the latest block and the nine before it.
        for latest in 0..40u64 {
            let blocks = (0..10)
                .filter_map(|offset| latest.checked_sub(offset))
                .map(|number| BlockBuilder::numbered(number).build());
            window.merge(blocks);
            assert_invariants(&window);
        }

        assert_eq!(numbers(&window), (30..40).rev().collect::<Vec<_>>());
    }
}
