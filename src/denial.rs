//! Per-zone denial index: an ordered set of NSEC/NSEC3 owner keys, with
//! interior ancestor placeholders for plain-NSEC zones (owner names form a
//! real subdomain tree) and a flat ordered set for NSEC3 zones (hashes have
//! no containment relationship, so there is nothing to materialize).
//!
//! The covering-interval search generalizes the teacher's
//! `dnssec::denial::name_in_range`/`hash_in_range` wrap-around predicate
//! (SPEC_FULL.md §4.3) from a linear scan over records already in a reply
//! into a `BTreeMap` predecessor lookup.

use std::collections::BTreeMap;

use crate::arena::{Arena, Id};
use crate::name::Name;
use crate::zone::ZoneId;

pub type DenialId = Id<DenialNode>;

/// Global identity of a denial node: which zone it lives in, plus its
/// per-zone arena id. The LRU list is global across zones, so its links
/// need this, not a bare [`DenialId`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlobalDenialId {
    pub zone: ZoneId,
    pub denial: DenialId,
}

/// Fixed per-node overhead charged against the byte budget in addition to
/// the variable-length key, matching SPEC_FULL.md §3 invariant 5's "fixed
/// overhead + variable owner-name length" accounting.
const NODE_OVERHEAD_BYTES: usize = 64;

pub struct DenialNode {
    /// Canonical sort key: a [`Name::sort_key`] for plain NSEC, or the raw
    /// NSEC3 hash bytes (already in the correct comparison order per RFC
    /// 5155 §7.2, no re-encoding needed).
    key: Vec<u8>,
    pub owner_name: Option<Name>,
    in_use: bool,
    descendant_in_use: usize,
    parent: Option<DenialId>,
    pub byte_size: usize,
    pub lru_prev: Option<GlobalDenialId>,
    pub lru_next: Option<GlobalDenialId>,
}

impl DenialNode {
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    fn use_count(&self) -> usize {
        self.descendant_in_use + usize::from(self.in_use)
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

#[derive(Default)]
pub struct DenialIndex {
    by_key: BTreeMap<Vec<u8>, DenialId>,
    arena: Arena<DenialNode>,
}

impl DenialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn node(&self, id: DenialId) -> &DenialNode {
        self.arena.get(id).expect("dangling DenialId")
    }

    pub fn node_mut(&mut self, id: DenialId) -> &mut DenialNode {
        self.arena.get_mut(id).expect("dangling DenialId")
    }

    /// Inserts an owner name for a plain-NSEC zone, materializing interior
    /// ancestors (by DNS name containment) as needed. Returns the node id,
    /// the bytes newly charged against the LRU budget (0 if the owner
    /// already existed), and any ancestor ids that just gained their first
    /// in-use descendant — the caller must unlink those from the LRU
    /// recency list, since a non-leaf denial no longer qualifies (SPEC
    /// §3 invariant 4).
    pub fn insert_nsec(&mut self, owner: &Name) -> (DenialId, usize, Vec<DenialId>) {
        if let Some(&existing) = self.by_key.get(owner.sort_key()) {
            let node = self.node_mut(existing);
            if !node.in_use {
                node.in_use = true;
                let promoted = self.bump_ancestor_use_count(existing);
                let added = NODE_OVERHEAD_BYTES + owner.sort_key().len();
                self.node_mut(existing).byte_size = added;
                return (existing, added, promoted);
            }
            return (existing, 0, Vec::new());
        }

        let parent = self.closest_tracked_ancestor(owner);
        let byte_size = NODE_OVERHEAD_BYTES + owner.sort_key().len();
        let id = self.arena.insert(DenialNode {
            key: owner.sort_key().to_vec(),
            owner_name: Some(owner.clone()),
            in_use: true,
            descendant_in_use: 0,
            parent,
            byte_size,
            lru_prev: None,
            lru_next: None,
        });
        self.by_key.insert(owner.sort_key().to_vec(), id);
        self.materialize_ancestors(owner, id);
        let promoted = self.bump_ancestor_use_count(id);
        (id, byte_size, promoted)
    }

    /// Inserts a hashed owner for an NSEC3 zone. NSEC3 hashes have no
    /// containment relationship, so there are no interior ancestors: every
    /// node is a flat, immediately in-use leaf.
    pub fn insert_nsec3(&mut self, hash: Vec<u8>) -> (DenialId, usize) {
        if let Some(&existing) = self.by_key.get(&hash) {
            return (existing, 0);
        }
        let byte_size = NODE_OVERHEAD_BYTES + hash.len();
        let id = self.arena.insert(DenialNode {
            key: hash.clone(),
            owner_name: None,
            in_use: true,
            descendant_in_use: 0,
            parent: None,
            byte_size,
            lru_prev: None,
            lru_next: None,
        });
        self.by_key.insert(hash, id);
        (id, byte_size)
    }

    fn closest_tracked_ancestor(&self, name: &Name) -> Option<DenialId> {
        let mut candidate = name.parent();
        while let Some(current) = candidate {
            if let Some(&id) = self.by_key.get(current.sort_key()) {
                return Some(id);
            }
            candidate = current.parent();
        }
        None
    }

    fn materialize_ancestors(&mut self, name: &Name, child: DenialId) {
        let mut current_name = name.clone();
        let mut current_child = child;
        loop {
            let Some(ancestor_name) = current_name.parent() else {
                break;
            };
            if let Some(&existing) = self.by_key.get(ancestor_name.sort_key()) {
                self.node_mut(current_child).parent = Some(existing);
                break;
            }
            let ancestor_id = self.arena.insert(DenialNode {
                key: ancestor_name.sort_key().to_vec(),
                owner_name: Some(ancestor_name.clone()),
                in_use: false,
                descendant_in_use: 0,
                parent: None,
                byte_size: 0,
                lru_prev: None,
                lru_next: None,
            });
            self.by_key.insert(ancestor_name.sort_key().to_vec(), ancestor_id);
            self.node_mut(current_child).parent = Some(ancestor_id);
            current_name = ancestor_name;
            current_child = ancestor_id;
        }
    }

    /// Walks from `id` up to the root, incrementing each ancestor's
    /// descendant-use count. Returns the ids of ancestors that were
    /// leaf-in-use before this call (`in_use` with `descendant_in_use ==
    /// 0`) and so just became non-leaf — the caller must unlink each from
    /// the LRU recency list.
    fn bump_ancestor_use_count(&mut self, id: DenialId) -> Vec<DenialId> {
        let mut promoted = Vec::new();
        let mut cursor = self.node(id).parent;
        while let Some(ancestor) = cursor {
            let node = self.node_mut(ancestor);
            if node.in_use && node.descendant_in_use == 0 {
                promoted.push(ancestor);
            }
            node.descendant_in_use += 1;
            cursor = node.parent;
        }
        promoted
    }

    /// True if `key` is the exact (in-use) owner/hash of some denial node —
    /// i.e. the name or NSEC3 hash in question is provably present, used
    /// when walking a closest-encloser chain (SPEC_FULL.md §4.6 step 2).
    pub fn contains_exact(&self, key: &[u8]) -> bool {
        self.by_key
            .get(key)
            .map(|&id| self.node(id).in_use())
            .unwrap_or(false)
    }

    /// Returns the in-use node keyed exactly by `key`, if any ("name
    /// exists" case of SPEC_FULL.md §4.3's search tie-break).
    pub fn get_exact(&self, key: &[u8]) -> Option<DenialId> {
        self.by_key
            .get(key)
            .copied()
            .filter(|&id| self.node(id).in_use())
    }

    /// Finds the covering entry for `target`: the node with the largest
    /// key `<= target`, i.e. a candidate `(owner, next)` interval's left
    /// edge. The caller (synthesis) still must confirm `target` falls
    /// strictly before the RRset's recorded `next` field, and handle
    /// wrap-around at the zone apex (the largest entry covers back around
    /// to the smallest).
    pub fn predecessor_or_wrap(&self, target: &[u8]) -> Option<DenialId> {
        if let Some((_, &id)) = self
            .by_key
            .range(..=target.to_vec())
            .rev()
            .find(|(_, &id)| self.node(id).in_use())
        {
            return Some(id);
        }
        // Wrap-around: every key is greater than target, so the covering
        // entry is the last (largest) one in canonical order.
        self.by_key
            .values()
            .rev()
            .copied()
            .find(|&id| self.node(id).in_use())
    }

    /// Removes the denial at `id`, cascading interior-ancestor removal up
    /// the parent chain (plain-NSEC case only; NSEC3 nodes have no parent).
    /// Returns the bytes freed.
    pub fn remove(&mut self, id: DenialId) -> usize {
        let node = self.node_mut(id);
        if !node.in_use {
            return 0;
        }
        node.in_use = false;
        let freed = node.byte_size;
        node.byte_size = 0;
        let parent = node.parent;
        let key = node.key.clone();
        let use_count_zero = node.use_count() == 0;

        if use_count_zero {
            self.arena.remove(id);
            self.by_key.remove(&key);
        }

        let mut cursor = parent;
        while let Some(ancestor) = cursor {
            let node = self.node_mut(ancestor);
            node.descendant_in_use = node.descendant_in_use.saturating_sub(1);
            if node.use_count() == 0 {
                let key = node.key.clone();
                let next = node.parent;
                self.arena.remove(ancestor);
                self.by_key.remove(&key);
                cursor = next;
            } else {
                break;
            }
        }
        freed
    }

    /// All currently in-use denial ids, i.e. exactly the nodes linked into
    /// the global LRU list for this zone. Used to unlink them from the LRU
    /// list before a parameter-change purge, since [`Self::clear`] discards
    /// the arena wholesale without walking the LRU links.
    pub fn in_use_ids(&self) -> Vec<DenialId> {
        self.by_key
            .values()
            .copied()
            .filter(|&id| self.node(id).in_use())
            .collect()
    }

    /// Drops every denial in this index (used when an NSEC3 parameter
    /// change invalidates the whole zone). Returns bytes freed.
    pub fn clear(&mut self) -> usize {
        let freed: usize = self
            .arena_values()
            .filter(|n| n.in_use)
            .map(|n| n.byte_size)
            .sum();
        self.by_key.clear();
        self.arena = Arena::new();
        freed
    }

    fn arena_values(&self) -> impl Iterator<Item = &DenialNode> {
        self.by_key.values().map(move |&id| self.node(id))
    }
}
