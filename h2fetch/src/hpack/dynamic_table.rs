//! Dynamic table of RFC 7541, section 2.3.2.

use std::collections::VecDeque;

use crate::solicit::header::Header;

/// Entries newest first; entry 0 has HPACK index 62.
#[derive(Debug)]
pub struct DynamicTable {
    entries: VecDeque<Header>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> DynamicTable {
        DynamicTable {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Header> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn evict_to(&mut self, target: usize) {
        while self.size > target {
            match self.entries.pop_back() {
                Some(evicted) => self.size -= evicted.hpack_size(),
                None => break,
            }
        }
    }

    /// Add an entry, evicting old ones. An entry larger than the table empties it.
    pub fn insert(&mut self, header: Header) {
        let entry_size = header.hpack_size();
        if entry_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }
        self.evict_to(self.max_size - entry_size);
        self.size += entry_size;
        self.entries.push_front(header);
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to(max_size);
    }
}
