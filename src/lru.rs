//! The LRU governor (SPEC_FULL.md §4.4): a single process-wide recency list
//! threaded through the denial nodes living inside the per-zone denial
//! indices, plus the global byte counter compared against the configured
//! cap.
//!
//! Grounded on the teacher's general "usage order via an explicit linked
//! structure" idea in `cache::mod::evict_lru`, but adapted from a
//! `Vec`-based FIFO (the teacher's `insertion_order: Mutex<Vec<CacheKey>>`,
//! which is O(n) to remove a middle entry) into a true intrusive doubly
//! linked list, since strict exact-LRU needs O(1) unlink-from-the-middle
//! on every `touch` (SPEC_FULL.md §4.4, §9: `slru`/`lockfree_lru` were read
//! and rejected as templates for the same reason documented in DESIGN.md).

use crate::denial::GlobalDenialId;
use crate::zone::{ZoneId, ZoneIndex};

/// Doubly-linked recency list over [`GlobalDenialId`]s, most-recently-used
/// at the head, least-recently-used at the tail, plus the byte budget.
pub struct LruList {
    head: Option<GlobalDenialId>,
    tail: Option<GlobalDenialId>,
    used_bytes: usize,
    cap_bytes: usize,
}

impl LruList {
    pub fn new(cap_bytes: usize) -> Self {
        Self {
            head: None,
            tail: None,
            used_bytes: 0,
            cap_bytes,
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn cap_bytes(&self) -> usize {
        self.cap_bytes
    }

    fn prev_of(zones: &ZoneIndex, id: GlobalDenialId) -> Option<GlobalDenialId> {
        zones.node(id.zone).denials.node(id.denial).lru_prev
    }

    fn next_of(zones: &ZoneIndex, id: GlobalDenialId) -> Option<GlobalDenialId> {
        zones.node(id.zone).denials.node(id.denial).lru_next
    }

    fn set_prev(zones: &mut ZoneIndex, id: GlobalDenialId, value: Option<GlobalDenialId>) {
        zones.node_mut(id.zone).denials.node_mut(id.denial).lru_prev = value;
    }

    fn set_next(zones: &mut ZoneIndex, id: GlobalDenialId, value: Option<GlobalDenialId>) {
        zones.node_mut(id.zone).denials.node_mut(id.denial).lru_next = value;
    }

    /// Unlinks `id` from the list without touching the byte counter. A
    /// no-op if `id` is not currently linked (used defensively; callers are
    /// expected to only unlink linked ids).
    fn unlink(&mut self, zones: &mut ZoneIndex, id: GlobalDenialId) {
        let prev = Self::prev_of(zones, id);
        let next = Self::next_of(zones, id);
        match prev {
            Some(p) => Self::set_next(zones, p, next),
            None => self.head = next,
        }
        match next {
            Some(n) => Self::set_prev(zones, n, prev),
            None => self.tail = prev,
        }
        Self::set_prev(zones, id, None);
        Self::set_next(zones, id, None);
    }

    fn push_front(&mut self, zones: &mut ZoneIndex, id: GlobalDenialId) {
        Self::set_prev(zones, id, None);
        Self::set_next(zones, id, self.head);
        if let Some(old_head) = self.head {
            Self::set_prev(zones, old_head, Some(id));
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    /// Moves `id` to the front of the list (most recently used). `id` must
    /// already be linked in the list.
    pub fn touch(&mut self, zones: &mut ZoneIndex, id: GlobalDenialId) {
        self.unlink(zones, id);
        self.push_front(zones, id);
    }

    /// Links a freshly-inserted leaf-in-use denial at the front and charges
    /// `bytes` against the budget.
    pub fn insert(&mut self, zones: &mut ZoneIndex, id: GlobalDenialId, bytes: usize) {
        self.push_front(zones, id);
        self.used_bytes += bytes;
    }

    /// Evicts nodes from the tail (strict LRU, no second chance) until
    /// `used_bytes <= cap_bytes`. Each eviction removes the denial from its
    /// zone's denial index (cascading interior-ancestor removal) and, if
    /// that empties the zone, removes the zone itself from the zone index.
    /// Returns the number of nodes evicted.
    pub fn evict_to_cap(&mut self, zones: &mut ZoneIndex) -> usize {
        let mut evicted = 0;
        while self.used_bytes > self.cap_bytes {
            let Some(tail) = self.tail else { break };
            self.remove_one(zones, tail);
            evicted += 1;
        }
        evicted
    }

    /// Removes a single denial node (used by both eviction and expiry-driven
    /// removal during synthesis, SPEC_FULL.md §4.6 step 2). Unlinks it from
    /// the LRU list, removes it from its zone's denial index, subtracts its
    /// bytes from the budget, and removes the zone itself if it becomes
    /// empty.
    pub fn remove_one(&mut self, zones: &mut ZoneIndex, id: GlobalDenialId) {
        self.unlink(zones, id);
        let class = zones.node(id.zone).class;
        let freed = zones.node_mut(id.zone).denials.remove(id.denial);
        self.used_bytes = self.used_bytes.saturating_sub(freed);
        zones.remove_if_empty(class, id.zone);
    }

    /// Unlinks and removes every currently in-use denial of `zone` from
    /// both the LRU list and the zone's own denial index. Used before a
    /// zone's NSEC3 parameters are replaced (SPEC_FULL.md §3's "replaced,
    /// not merged" rule): [`crate::denial::DenialIndex::clear`] discards
    /// the whole per-zone arena at once without walking LRU links, so
    /// those links must be torn down here first or the global list would
    /// be left pointing at freed slots.
    pub fn purge_zone(&mut self, zones: &mut ZoneIndex, zone: ZoneId) -> usize {
        let ids = zones.node(zone).denials.in_use_ids();
        let count = ids.len();
        for denial in ids {
            self.remove_one(zones, GlobalDenialId { zone, denial });
        }
        count
    }

    /// Removes `id` from the recency list only, leaving the byte counter
    /// and the zone's denial index untouched. Used when a denial gains its
    /// first in-use descendant and so is no longer a *leaf*-in-use denial
    /// (SPEC_FULL.md §3 invariant 4): it stays in-use and still counts
    /// against the byte budget, it just no longer belongs in the LRU.
    pub fn unlink_only(&mut self, zones: &mut ZoneIndex, id: GlobalDenialId) {
        self.unlink(zones, id);
    }

    /// Walks the list counting entries. Only used by tests/diagnostics; the
    /// hot paths never need a length, only the byte counter.
    pub fn len(&self, zones: &ZoneIndex) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            count += 1;
            cursor = Self::next_of(zones, id);
        }
        count
    }

    pub fn front(&self) -> Option<GlobalDenialId> {
        self.head
    }

    pub fn back(&self) -> Option<GlobalDenialId> {
        self.tail
    }
}
