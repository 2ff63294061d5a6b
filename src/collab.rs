//! Collaborator boundary: the RRset cache that owns the actual NSEC/NSEC3
//! record bodies. This crate stores only owner-name keys into it.
//!
//! Grounded on the handle-based cache-lookup pattern in
//! `other_examples/4f1e8bbe_nresare-recursive-resolver__src-cache.rs.rs`
//! (a `Cache<K,V>` returning an opaque value plus remaining-TTL rather than
//! exposing its internal storage) and on the `tracing::instrument` style
//! used there.

use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::DNSResource;
use crate::name::Name;

/// An opaque handle into the RRset cache, passed back to `mark_expired`
/// without this crate needing to know anything about its internal shape.
#[derive(Clone, Debug)]
pub struct RrsetHandle {
    pub owner: Name,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
}

/// The RRset cache collaborator. Concrete implementations live outside
/// this crate (per SPEC_FULL.md §1); this trait is the seam.
pub trait RrsetCache: Send + Sync {
    /// Looks up the RRset for `(owner, rtype, rclass)`. Returns the
    /// resource records plus a remaining-TTL-at-`now` in seconds, or
    /// `None` if absent or already known-expired.
    fn lookup(
        &self,
        owner: &Name,
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        now: u64,
    ) -> Option<(Vec<DNSResource>, u32)>;

    /// Marks an entry this crate determined to be stale as expired. Does
    /// not error: the RRset cache owns its own eviction policy and may
    /// ignore the hint.
    fn mark_expired(&self, handle: &RrsetHandle);
}

/// An in-memory test double used by this crate's own unit and integration
/// tests. Not part of the public API surface beyond `#[cfg(test)]`.
#[cfg(test)]
pub mod test_double {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Clone, Debug)]
    struct Entry {
        records: Vec<DNSResource>,
        expires_at: u64,
    }

    #[derive(Default)]
    pub struct TestRrsetCache {
        entries: Mutex<HashMap<(Name, DNSResourceType, DNSResourceClass), Entry>>,
    }

    impl TestRrsetCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(
            &self,
            owner: Name,
            rtype: DNSResourceType,
            rclass: DNSResourceClass,
            records: Vec<DNSResource>,
            expires_at: u64,
        ) {
            self.entries
                .lock()
                .insert((owner, rtype, rclass), Entry { records, expires_at });
        }
    }

    impl RrsetCache for TestRrsetCache {
        fn lookup(
            &self,
            owner: &Name,
            rtype: DNSResourceType,
            rclass: DNSResourceClass,
            now: u64,
        ) -> Option<(Vec<DNSResource>, u32)> {
            let entries = self.entries.lock();
            let entry = entries.get(&(owner.clone(), rtype, rclass))?;
            if entry.expires_at <= now {
                return None;
            }
            Some((entry.records.clone(), (entry.expires_at - now) as u32))
        }

        fn mark_expired(&self, handle: &RrsetHandle) {
            let mut entries = self.entries.lock();
            entries.remove(&(handle.owner.clone(), handle.rtype, handle.rclass));
        }
    }
}
