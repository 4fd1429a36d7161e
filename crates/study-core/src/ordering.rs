//! Submission-order delivery of model replies
//!
//! Every question runs its own request, so replies can complete in any
//! order. The sequencer hands out increasing ids and only releases a reply
//! once every earlier reply has been released.

use std::collections::BTreeMap;

pub type RequestId = u64;

#[derive(Debug)]
pub struct ReplySequencer<T> {
    next_id: RequestId,
    next_release: RequestId,
    held: BTreeMap<RequestId, T>,
}

impl<T> Default for ReplySequencer<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            next_release: 0,
            held: BTreeMap::new(),
        }
    }
}

impl<T> ReplySequencer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Record the reply for `id` and return every reply that is now in order.
    ///
    /// Ids that were never issued or were already released are ignored.
    pub fn accept(&mut self, id: RequestId, reply: T) -> Vec<T> {
        if id < self.next_release || id >= self.next_id {
            tracing::warn!(id, "ignoring reply for unknown request");
            return Vec::new();
        }
        self.held.insert(id, reply);

        let mut ready = Vec::new();
        while let Some(reply) = self.held.remove(&self.next_release) {
            ready.push(reply);
            self.next_release += 1;
        }
        ready
    }

    /// Requests issued but not yet released.
    pub fn pending(&self) -> usize {
        (self.next_id - self.next_release) as usize
    }

    /// Replies that arrived early and are waiting on an earlier one.
    pub fn held(&self) -> usize {
        self.held.len()
    }
}
