//! The public `NegativeCache` facade (SPEC_FULL.md §6): a single coarse
//! `parking_lot::Mutex` guarding the zone index, every zone's denial index,
//! and the LRU governor together, per §5's "big lock" concurrency model —
//! the same lock choice the teacher uses throughout its own `cache` module.
//!
//! The strict §5 text releases the lock around each RRset-cache call during
//! synthesis and re-acquires it only to remove expired entries. This crate
//! keeps the simpler single-critical-section shape instead (documented as
//! a deviation in DESIGN.md): the RRset-cache collaborator here is an
//! in-process trait object, not a remote call, so the extra lock-splitting
//! machinery would add complexity without a real suspension point to
//! justify it.

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::collab::RrsetCache;
use crate::config::NegCacheConfig;
use crate::dns::enums::DNSResourceClass;
use crate::dns::packet::DNSPacket;
use crate::dns::question::Query;
use crate::ingest;
use crate::lru::LruList;
use crate::name::Name;
use crate::synthesis::{self, DlvOutcome, SynthesisOutcome};
use crate::zone::ZoneIndex;

struct Inner {
    zones: ZoneIndex,
    lru: LruList,
}

/// The aggressive negative cache. Construct one per resolver process;
/// `Drop` is the ordinary Rust destructor (SPEC_FULL.md §6's "no other
/// threads active" precondition is documented here rather than enforced by
/// a separate `destroy` call).
pub struct NegativeCache {
    inner: Mutex<Inner>,
    nsec3_max_iterations: u16,
}

impl NegativeCache {
    pub fn new(cap_bytes: usize, nsec3_max_iterations: u16) -> Self {
        debug!(cap_bytes, nsec3_max_iterations, "negative cache initialized");
        Self {
            inner: Mutex::new(Inner {
                zones: ZoneIndex::new(),
                lru: LruList::new(cap_bytes),
            }),
            nsec3_max_iterations,
        }
    }

    pub fn from_config(config: &NegCacheConfig) -> Self {
        Self::new(config.size_bytes, config.nsec3_max_iterations)
    }

    /// Ingests a full validated reply (SPEC_FULL.md §4.5). Best-effort:
    /// never fails observably.
    pub fn add_reply(&self, reply: &DNSPacket) {
        let mut inner = self.inner.lock();
        let Inner { zones, lru } = &mut *inner;
        ingest::add_reply(zones, lru, self.nsec3_max_iterations, reply);
        trace!(used_bytes = lru.used_bytes(), "ingested reply");
    }

    /// Ingests a validated referral, with the bailiwick zone supplied
    /// explicitly (SPEC_FULL.md §4.5).
    pub fn add_referral(&self, reply: &DNSPacket, bailiwick: &Name) {
        let mut inner = self.inner.lock();
        let Inner { zones, lru } = &mut *inner;
        ingest::add_referral(zones, lru, self.nsec3_max_iterations, reply, bailiwick);
        trace!(used_bytes = lru.used_bytes(), "ingested referral");
    }

    /// Attempts to synthesize a negative reply for `query` (SPEC_FULL.md
    /// §4.6).
    pub fn get_message(&self, query: &Query, rrset_cache: &dyn RrsetCache, now: u64) -> SynthesisOutcome {
        let mut inner = self.inner.lock();
        let Inner { zones, lru } = &mut *inner;
        let outcome = synthesis::get_message(zones, lru, query, rrset_cache, now);
        match &outcome {
            SynthesisOutcome::Reply(msg) => debug!(rcode = ?msg.rcode, qname = %query.qname, "synthesized negative reply"),
            SynthesisOutcome::NoProof => trace!(qname = %query.qname, "no cached proof"),
            SynthesisOutcome::Error(err) => debug!(%err, qname = %query.qname, "synthesis failed"),
        }
        outcome
    }

    /// The DLV-style existence probe (SPEC_FULL.md §4.7).
    pub fn dlv_lookup(
        &self,
        name: &Name,
        class: DNSResourceClass,
        rrset_cache: &dyn RrsetCache,
        now: u64,
    ) -> DlvOutcome {
        let mut inner = self.inner.lock();
        let Inner { zones, lru } = &mut *inner;
        synthesis::dlv_lookup(zones, lru, name, class, rrset_cache, now)
    }

    /// Total bytes currently charged against the LRU budget.
    pub fn memory_in_use(&self) -> usize {
        self.inner.lock().lru.used_bytes()
    }

    /// Number of zones currently tracked (in-use or interior placeholder).
    /// Diagnostic only.
    pub fn zone_count(&self) -> usize {
        self.inner.lock().zones.zone_count()
    }
}
