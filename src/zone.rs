//! The zone index: an ordered, canonically-keyed set of zones, with
//! interior (placeholder) ancestors materialized so every in-use zone's
//! strict ancestors are present (SPEC_FULL.md §3 invariant 2, §4.2).
//!
//! Grounded on the `BTreeMap`-plus-arena design note in SPEC_FULL.md §9;
//! the "index by canonical name, walk ancestors on insert" shape borrows
//! the intent (not the reversed-label implementation) of the teacher's
//! `cache::mod::DomainTrie`.

use std::collections::BTreeMap;

use crate::arena::{Arena, Id};
use crate::denial::DenialIndex;
use crate::dns::enums::DNSResourceClass;
use crate::dnssec::nsec::Nsec3Param;
use crate::name::Name;

/// A zone's denial-chain parameters (SPEC_FULL.md §3): either the
/// plain-NSEC sentinel, or a concrete NSEC3 hash/iterations/salt triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZoneParams {
    PlainNsec,
    Nsec3(Nsec3Param),
}

impl ZoneParams {
    pub fn as_nsec3(&self) -> Option<&Nsec3Param> {
        match self {
            Self::PlainNsec => None,
            Self::Nsec3(params) => Some(params),
        }
    }
}

pub type ZoneId = Id<ZoneNode>;

pub struct ZoneNode {
    pub name: Name,
    pub class: DNSResourceClass,
    parent: Option<ZoneId>,
    /// `Some` for a real (in-use) zone; `None` for an interior placeholder
    /// materialized only to keep ancestor coverage.
    pub params: Option<ZoneParams>,
    /// Number of in-use descendant zones reachable through this node,
    /// not counting this node itself.
    descendant_in_use: usize,
    pub denials: DenialIndex,
}

impl ZoneNode {
    fn in_use(&self) -> bool {
        self.params.is_some()
    }

    fn use_count(&self) -> usize {
        self.descendant_in_use + usize::from(self.in_use())
    }
}

/// Ordered map key: `(class as u16, canonical sort key)`. Class participates
/// in the key (not the ordering tie-break alone) so distinct classes never
/// collide; numeric-ascending by class is an arbitrary but stable
/// tie-break, matching §4.2.
type ZoneKey = (u16, Vec<u8>);

#[derive(Default)]
pub struct ZoneIndex {
    by_name: BTreeMap<ZoneKey, ZoneId>,
    arena: Arena<ZoneNode>,
}

fn zone_key(class: DNSResourceClass, name: &Name) -> ZoneKey {
    (u16::from(class), name.sort_key().to_vec())
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: ZoneId) -> &ZoneNode {
        self.arena.get(id).expect("dangling ZoneId")
    }

    pub fn node_mut(&mut self, id: ZoneId) -> &mut ZoneNode {
        self.arena.get_mut(id).expect("dangling ZoneId")
    }

    pub fn find_zone(&self, class: DNSResourceClass, name: &Name) -> Option<ZoneId> {
        self.by_name
            .get(&zone_key(class, name))
            .copied()
            .filter(|&id| self.node(id).in_use())
    }

    /// The deepest in-use ancestor zone of `name` (including `name` itself
    /// if it is itself a tracked zone), or `None` if no ancestor is
    /// tracked at all.
    pub fn closest_encloser(&self, class: DNSResourceClass, name: &Name) -> Option<ZoneId> {
        let mut candidate = Some(name.clone());
        while let Some(current) = candidate {
            if let Some(id) = self.find_zone(class, &current) {
                return Some(id);
            }
            candidate = current.parent();
        }
        None
    }

    /// Inserts (or replaces the parameters of) the zone `(class, name)`.
    /// If the zone already existed with different parameters, its denials
    /// are purged in full (SPEC_FULL.md's Open Questions resolution: no
    /// partial retention across a parameter change) and `used_bytes_delta`
    /// reports the byte count to remove from the LRU governor's budget.
    pub fn ensure_zone(
        &mut self,
        class: DNSResourceClass,
        name: &Name,
        params: ZoneParams,
    ) -> (ZoneId, usize) {
        if let Some(existing) = self.by_name.get(&zone_key(class, name)).copied() {
            let node = self.node_mut(existing);
            if node.in_use() && node.params.as_ref() != Some(&params) {
                let freed = node.denials.clear();
                self.node_mut(existing).params = Some(params);
                return (existing, freed);
            }
            if !node.in_use() {
                // Was an interior placeholder; becomes a real zone.
                self.node_mut(existing).params = Some(params);
                self.bump_ancestor_use_count(existing);
            }
            return (existing, 0);
        }

        let parent = self.closest_encloser(class, name);
        let id = self.arena.insert(ZoneNode {
            name: name.clone(),
            class,
            parent,
            params: Some(params),
            descendant_in_use: 0,
            denials: DenialIndex::new(),
        });
        self.by_name.insert(zone_key(class, name), id);
        self.materialize_ancestors(class, name, id);
        self.bump_ancestor_use_count(id);
        (id, 0)
    }

    /// Ensures interior placeholder zones exist for every strict ancestor
    /// of `name` down to (but not including) the nearest already-tracked
    /// ancestor, linking `child`'s parent chain through them.
    fn materialize_ancestors(&mut self, class: DNSResourceClass, name: &Name, child: ZoneId) {
        let mut current_name = name.clone();
        let mut current_child = child;
        loop {
            let Some(ancestor_name) = current_name.parent() else {
                break;
            };
            if let Some(existing) = self.by_name.get(&zone_key(class, &ancestor_name)).copied() {
                self.node_mut(current_child).parent = Some(existing);
                break;
            }
            let ancestor_id = self.arena.insert(ZoneNode {
                name: ancestor_name.clone(),
                class,
                parent: None,
                params: None,
                descendant_in_use: 0,
                denials: DenialIndex::new(),
            });
            self.by_name.insert(zone_key(class, &ancestor_name), ancestor_id);
            self.node_mut(current_child).parent = Some(ancestor_id);
            current_name = ancestor_name;
            current_child = ancestor_id;
        }
    }

    fn bump_ancestor_use_count(&mut self, id: ZoneId) {
        let mut cursor = self.node(id).parent;
        while let Some(ancestor) = cursor {
            let node = self.node_mut(ancestor);
            node.descendant_in_use += 1;
            cursor = node.parent;
        }
    }

    /// Removes the zone if it has become fully empty (no denials left and
    /// not otherwise in use), walking parents and removing any interior
    /// node whose use-count drops to zero. Returns any bytes freed.
    pub fn remove_if_empty(&mut self, class: DNSResourceClass, id: ZoneId) {
        let node = self.node(id);
        if node.in_use() && !node.denials.is_empty() {
            return;
        }
        let name = node.name.clone();
        let parent = node.parent;
        self.by_name.remove(&zone_key(class, &name));
        self.arena.remove(id);

        let mut cursor = parent;
        while let Some(ancestor) = cursor {
            let node = self.node_mut(ancestor);
            node.descendant_in_use = node.descendant_in_use.saturating_sub(1);
            if node.use_count() == 0 {
                let name = node.name.clone();
                let next = node.parent;
                self.by_name.remove(&zone_key(class, &name));
                self.arena.remove(ancestor);
                cursor = next;
            } else {
                break;
            }
        }
    }

    pub fn zone_count(&self) -> usize {
        self.arena.len()
    }

    /// True if `id` still names a live arena slot. Synthesis retries a
    /// covering search after evicting an expired denial, which can empty
    /// and remove the zone itself (SPEC_FULL.md §4.4); callers must check
    /// this before dereferencing `id` again.
    pub fn contains_zone(&self, id: ZoneId) -> bool {
        self.arena.get(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ZoneParams {
        ZoneParams::Nsec3(Nsec3Param {
            hash_algorithm: crate::dnssec::nsec::HashAlgorithm::Sha1,
            iterations: 10,
            salt: vec![0xaa, 0xbb],
        })
    }

    #[test]
    fn ensure_zone_materializes_ancestors() {
        let mut zones = ZoneIndex::new();
        let name = Name::parse("sub.example.com.").unwrap();
        let (id, freed) = zones.ensure_zone(DNSResourceClass::IN, &name, params());
        assert_eq!(freed, 0);
        assert!(zones.find_zone(DNSResourceClass::IN, &name).is_some());
        assert_eq!(zones.node(id).name, name);
        // Ancestors materialized, but not "found" as zones since they are
        // interior-only placeholders.
        let parent_name = Name::parse("example.com.").unwrap();
        assert!(zones.find_zone(DNSResourceClass::IN, &parent_name).is_none());
    }

    #[test]
    fn closest_encloser_walks_up() {
        let mut zones = ZoneIndex::new();
        let zone_name = Name::parse("example.com.").unwrap();
        zones.ensure_zone(DNSResourceClass::IN, &zone_name, params());

        let query_name = Name::parse("deep.sub.example.com.").unwrap();
        let encloser = zones
            .closest_encloser(DNSResourceClass::IN, &query_name)
            .unwrap();
        assert_eq!(zones.node(encloser).name, zone_name);
    }

    #[test]
    fn parameter_change_reports_freed_bytes_and_replaces() {
        let mut zones = ZoneIndex::new();
        let zone_name = Name::parse("example.com.").unwrap();
        let (id, _) = zones.ensure_zone(DNSResourceClass::IN, &zone_name, params());
        zones
            .node_mut(id)
            .denials
            .insert_nsec(&Name::parse("a.example.com.").unwrap());
        assert!(!zones.node(id).denials.is_empty());

        let new_params = ZoneParams::Nsec3(Nsec3Param {
            iterations: 50,
            hash_algorithm: crate::dnssec::nsec::HashAlgorithm::Sha1,
            salt: vec![0xaa, 0xbb],
        });
        let (same_id, freed) = zones.ensure_zone(DNSResourceClass::IN, &zone_name, new_params.clone());
        assert_eq!(same_id, id);
        assert!(freed > 0);
        assert!(zones.node(id).denials.is_empty());
        assert_eq!(zones.node(id).params, Some(new_params));
    }
}
