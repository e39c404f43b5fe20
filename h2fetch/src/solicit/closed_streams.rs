use std::collections::HashSet;
use std::collections::VecDeque;

use crate::solicit::stream_id::StreamId;

/// Streams we recently reset ourselves.
///
/// The peer may still have frames in flight on those streams; they must be
/// ignored rather than treated as a `STREAM_CLOSED` error.
#[derive(Default, Debug)]
pub struct ClosedStreams {
    set: HashSet<StreamId>,
    lru: VecDeque<StreamId>,
}

const MAX_SIZE: usize = 100;

impl ClosedStreams {
    pub fn new() -> ClosedStreams {
        Default::default()
    }

    pub fn contains(&self, stream_id: StreamId) -> bool {
        self.set.contains(&stream_id)
    }

    pub fn add(&mut self, stream_id: StreamId) {
        if self.set.insert(stream_id) {
            if self.lru.len() == MAX_SIZE {
                if let Some(remove) = self.lru.pop_front() {
                    self.set.remove(&remove);
                }
            }

            self.lru.push_back(stream_id);
        }
    }

    #[cfg(test)]
    pub fn self_check(&self) {
        assert_eq!(self.set.len(), self.lru.len());
        for stream_id in &self.lru {
            assert!(self.set.contains(stream_id));
        }
    }
}
