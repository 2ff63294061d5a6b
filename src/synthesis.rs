//! The synthesis path (SPEC_FULL.md §4.6) and its DLV-style existence probe
//! (§4.7): turns a cached NSEC/NSEC3 chain into a DNSSEC-shaped negative
//! reply without contacting an authoritative server.
//!
//! Grounded on the teacher's `dnssec::denial::{validate_nsec_denial,
//! validate_nsec3_denial}` for the covering-interval and closest-encloser
//! arithmetic, generalized here from "check one reply against one query"
//! into "search the whole zone's chain for a proof". Message assembly
//! follows the RCODE/authority-section shape of `cache::mod::CacheEntry`'s
//! synthesized-response path.

use crate::collab::RrsetCache;
use crate::denial::{DenialId, DenialIndex, GlobalDenialId};
use crate::dns::enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use crate::dns::question::Query;
use crate::dns::resource::DNSResource;
use crate::dnssec::nsec::{Nsec, Nsec3, RecordTypeBitmap, compute_nsec3_hash, hash_to_text};
use crate::error::SynthesisError;
use crate::lru::LruList;
use crate::name::Name;
use crate::zone::{ZoneId, ZoneIndex};

/// An assembled negative reply: RCODE plus answer/authority sections, ready
/// for the caller's downstream validator to re-verify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesizedMessage {
    pub rcode: ResponseCode,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
}

/// Result of [`get_message`]. `Error` is reserved for resource exhaustion
/// during assembly (SPEC_FULL.md §7 item 3); a missing or expired proof is
/// `NoProof`, never an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Reply(SynthesizedMessage),
    NoProof,
    Error(SynthesisError),
}

/// Result of [`dlv_lookup`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DlvOutcome {
    ProvenAbsent,
    NotProven,
}

struct FetchedNsec {
    denial: DenialId,
    record: DNSResource,
    ttl: u32,
    parsed: Nsec,
}

struct FetchedNsec3 {
    denial: DenialId,
    record: DNSResource,
    ttl: u32,
    parsed: Nsec3,
}

/// Entry point for §4.6. Takes the zone index and LRU list under whatever
/// lock the caller holds (this crate's coarse mutex, per §5 — collapsed
/// here into a single critical section rather than released/reacquired
/// around each RRset-cache call; see DESIGN.md for that simplification).
pub fn get_message(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    query: &Query,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> SynthesisOutcome {
    let Some(zone_id) = zones.closest_encloser(query.qclass, &query.qname) else {
        return SynthesisOutcome::NoProof;
    };
    let zone_name = zones.node(zone_id).name.clone();
    let is_nsec3 = zones
        .node(zone_id)
        .params
        .as_ref()
        .and_then(|p| p.as_nsec3())
        .is_some();

    if is_nsec3 {
        synthesize_nsec3(zones, lru, zone_id, &zone_name, query, rrset_cache, now)
    } else {
        synthesize_plain_nsec(zones, lru, zone_id, &zone_name, query, rrset_cache, now)
    }
}

/// Entry point for §4.7: identical search, collapsed to a boolean. Any
/// expired denial encountered is removed as a side effect of the search
/// itself (shared with [`get_message`]).
pub fn dlv_lookup(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    name: &Name,
    class: DNSResourceClass,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> DlvOutcome {
    let probe = Query {
        qname: name.clone(),
        qtype: DNSResourceType::Unknown,
        qclass: class,
    };
    match get_message(zones, lru, &probe, rrset_cache, now) {
        SynthesisOutcome::Reply(msg) if msg.rcode == ResponseCode::NameError => DlvOutcome::ProvenAbsent,
        _ => DlvOutcome::NotProven,
    }
}

fn synthesize_plain_nsec(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    zone_name: &Name,
    query: &Query,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> SynthesisOutcome {
    let qname = &query.qname;
    let class = query.qclass;

    let exact = zones.node(zone_id).denials.get_exact(qname.sort_key());
    if exact.is_some() {
        let Some(fetched) = fetch_nsec_exact(zones, lru, zone_id, class, qname, rrset_cache, now) else {
            return SynthesisOutcome::NoProof;
        };
        return nodata_reply(
            fetched.record,
            fetched.ttl,
            &fetched.parsed.types,
            query.qtype,
            zone_name,
            class,
            rrset_cache,
            now,
        );
    }

    let Some(covering) = fetch_nsec_covering(zones, lru, zone_id, class, qname.sort_key(), rrset_cache, now) else {
        return SynthesisOutcome::NoProof;
    };

    let encloser_name = {
        let denials = &zones.node(zone_id).denials;
        match closest_encloser_and_next_closer(denials, zone_name, qname, |n| n.sort_key().to_vec()) {
            Some((encloser, _next_closer)) => encloser,
            None => return SynthesisOutcome::NoProof,
        }
    };
    let Ok(wildcard) = encloser_name.wildcard_child() else {
        return SynthesisOutcome::NoProof;
    };
    let Some(wildcard_covering) =
        fetch_nsec_covering(zones, lru, zone_id, class, wildcard.sort_key(), rrset_cache, now)
    else {
        return SynthesisOutcome::NoProof;
    };
    let Some((soa_record, soa_ttl)) = fetch_soa(zone_name, class, rrset_cache, now) else {
        return SynthesisOutcome::NoProof;
    };

    let mut authorities = vec![covering.record];
    if wildcard_covering.denial != covering.denial {
        authorities.push(wildcard_covering.record);
    }
    let ttl = covering.ttl.min(wildcard_covering.ttl).min(soa_ttl);
    authorities.push(soa_record);

    finalize(ResponseCode::NameError, Vec::new(), authorities, ttl)
}

fn synthesize_nsec3(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    zone_name: &Name,
    query: &Query,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> SynthesisOutcome {
    let qname = &query.qname;
    let class = query.qclass;
    let Some(params) = zones
        .node(zone_id)
        .params
        .as_ref()
        .and_then(|p| p.as_nsec3())
        .cloned()
    else {
        return SynthesisOutcome::NoProof;
    };
    let key_of = |n: &Name| compute_nsec3_hash(n, params.iterations, &params.salt);

    let qname_hash = key_of(qname);
    if zones.node(zone_id).denials.get_exact(&qname_hash).is_some() {
        let Some(fetched) = fetch_nsec3_exact(zones, lru, zone_id, zone_name, class, &qname_hash, rrset_cache, now)
        else {
            return SynthesisOutcome::NoProof;
        };
        return nodata_reply(
            fetched.record,
            fetched.ttl,
            &fetched.parsed.types,
            query.qtype,
            zone_name,
            class,
            rrset_cache,
            now,
        );
    }

    let (encloser_name, next_closer_name) = {
        let denials = &zones.node(zone_id).denials;
        match closest_encloser_and_next_closer(denials, zone_name, qname, key_of) {
            Some(pair) => pair,
            None => return SynthesisOutcome::NoProof,
        }
    };

    let encloser_hash = key_of(&encloser_name);
    let Some(encloser_fetched) =
        fetch_nsec3_exact(zones, lru, zone_id, zone_name, class, &encloser_hash, rrset_cache, now)
    else {
        return SynthesisOutcome::NoProof;
    };

    let next_closer_hash = key_of(&next_closer_name);
    let Some(next_closer_fetched) =
        fetch_nsec3_covering(zones, lru, zone_id, zone_name, class, &next_closer_hash, rrset_cache, now)
    else {
        return SynthesisOutcome::NoProof;
    };

    let mut authorities = vec![encloser_fetched.record, next_closer_fetched.record];
    let mut ttl = encloser_fetched.ttl.min(next_closer_fetched.ttl);

    // RFC 5155 §7.2.1: an opt-out next-closer NSEC3 already covers the
    // entire insecure delegation span, so no wildcard proof is required.
    if !next_closer_fetched.parsed.opt_out {
        let Ok(wildcard) = encloser_name.wildcard_child() else {
            return SynthesisOutcome::NoProof;
        };
        let wildcard_hash = key_of(&wildcard);
        let Some(wildcard_fetched) =
            fetch_nsec3_covering(zones, lru, zone_id, zone_name, class, &wildcard_hash, rrset_cache, now)
        else {
            return SynthesisOutcome::NoProof;
        };
        if wildcard_fetched.denial != next_closer_fetched.denial {
            authorities.push(wildcard_fetched.record);
        }
        ttl = ttl.min(wildcard_fetched.ttl);
    }

    let Some((soa_record, soa_ttl)) = fetch_soa(zone_name, class, rrset_cache, now) else {
        return SynthesisOutcome::NoProof;
    };
    authorities.push(soa_record);
    ttl = ttl.min(soa_ttl);

    finalize(ResponseCode::NameError, Vec::new(), authorities, ttl)
}

/// Walks strict ancestors of `qname` (stopping at `zone_name`) looking for
/// the deepest one whose `key_of` image is an exact owner in `denials` —
/// the closest encloser. `next_closer` is the child of the encloser on the
/// path down to `qname`, the name actually required to be covered. Shared
/// between the plain-NSEC (`key_of = sort_key`) and NSEC3
/// (`key_of = hashed owner`) cases, since both reduce to the same walk-up
/// search over different key spaces.
fn closest_encloser_and_next_closer(
    denials: &DenialIndex,
    zone_name: &Name,
    qname: &Name,
    key_of: impl Fn(&Name) -> Vec<u8>,
) -> Option<(Name, Name)> {
    let mut next_closer = qname.clone();
    let mut candidate = qname.parent()?;
    loop {
        if denials.contains_exact(&key_of(&candidate)) {
            return Some((candidate, next_closer));
        }
        if &candidate == zone_name {
            return None;
        }
        next_closer = candidate.clone();
        candidate = candidate.parent()?;
    }
}

fn fetch_nsec_exact(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    class: DNSResourceClass,
    owner: &Name,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> Option<FetchedNsec> {
    let id = zones.node(zone_id).denials.get_exact(owner.sort_key())?;
    match rrset_cache.lookup(owner, DNSResourceType::NSEC, class, now) {
        Some((records, ttl)) => {
            let record = records.into_iter().find(|r| r.rtype == DNSResourceType::NSEC)?;
            let parsed = Nsec::parse_rdata(owner.clone(), &record.rdata).ok()?;
            lru.touch(zones, GlobalDenialId { zone: zone_id, denial: id });
            Some(FetchedNsec { denial: id, record, ttl, parsed })
        }
        None => {
            lru.remove_one(zones, GlobalDenialId { zone: zone_id, denial: id });
            None
        }
    }
}

/// True if `target` lies strictly inside the open interval `(owner, next)`
/// in canonical order, accounting for wrap-around at the zone apex when
/// `next` sorts before `owner` (the chain's last entry covers back around
/// to the smallest name/hash). A single-entry chain has `owner == next`
/// and covers everything except `owner` itself (SPEC_FULL.md §4.3).
fn target_in_interval(owner: &[u8], next: &[u8], target: &[u8]) -> bool {
    if owner == next {
        return target != owner;
    }
    if owner < next {
        owner < target && target < next
    } else {
        target > owner || target < next
    }
}

/// Searches for the denial covering `target`, retrying once against the
/// next-best candidate if the first one's RRset is missing or expired
/// (SPEC_FULL.md §4.6 step 2: "remove the denial node and retry once").
/// A predecessor whose interval doesn't actually reach past `target` is not
/// a retryable failure — `predecessor_or_wrap` already found the closest
/// candidate, so no other node will cover it either — and returns `None`
/// immediately without touching the LRU.
fn fetch_nsec_covering(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    class: DNSResourceClass,
    target: &[u8],
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> Option<FetchedNsec> {
    for _ in 0..2 {
        if !zones.contains_zone(zone_id) {
            return None;
        }
        let id = zones.node(zone_id).denials.predecessor_or_wrap(target)?;
        let owner = zones.node(zone_id).denials.node(id).owner_name.clone()?;
        match rrset_cache.lookup(&owner, DNSResourceType::NSEC, class, now) {
            Some((records, ttl)) => {
                let record = records.into_iter().find(|r| r.rtype == DNSResourceType::NSEC)?;
                let owner_key = owner.sort_key().to_vec();
                let parsed = Nsec::parse_rdata(owner, &record.rdata).ok()?;
                if !target_in_interval(&owner_key, parsed.next_owner.sort_key(), target) {
                    return None;
                }
                lru.touch(zones, GlobalDenialId { zone: zone_id, denial: id });
                return Some(FetchedNsec { denial: id, record, ttl, parsed });
            }
            None => {
                lru.remove_one(zones, GlobalDenialId { zone: zone_id, denial: id });
            }
        }
    }
    None
}

fn fetch_nsec3_exact(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    zone_name: &Name,
    class: DNSResourceClass,
    hash: &[u8],
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> Option<FetchedNsec3> {
    let id = zones.node(zone_id).denials.get_exact(hash)?;
    let owner = nsec3_owner_name(zone_name, hash)?;
    match rrset_cache.lookup(&owner, DNSResourceType::NSEC3, class, now) {
        Some((records, ttl)) => {
            let record = records.into_iter().find(|r| r.rtype == DNSResourceType::NSEC3)?;
            let parsed = Nsec3::parse_rdata(hash.to_vec(), &record.rdata).ok()?;
            lru.touch(zones, GlobalDenialId { zone: zone_id, denial: id });
            Some(FetchedNsec3 { denial: id, record, ttl, parsed })
        }
        None => {
            lru.remove_one(zones, GlobalDenialId { zone: zone_id, denial: id });
            None
        }
    }
}

/// Same search as [`fetch_nsec_covering`] but over NSEC3 hashes; see that
/// function's doc comment for the non-retry rule on a non-covering
/// predecessor.
fn fetch_nsec3_covering(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    zone_name: &Name,
    class: DNSResourceClass,
    target_hash: &[u8],
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> Option<FetchedNsec3> {
    for _ in 0..2 {
        if !zones.contains_zone(zone_id) {
            return None;
        }
        let id = zones.node(zone_id).denials.predecessor_or_wrap(target_hash)?;
        let key = zones.node(zone_id).denials.node(id).key().to_vec();
        let owner = nsec3_owner_name(zone_name, &key)?;
        match rrset_cache.lookup(&owner, DNSResourceType::NSEC3, class, now) {
            Some((records, ttl)) => {
                let record = records.into_iter().find(|r| r.rtype == DNSResourceType::NSEC3)?;
                let parsed = Nsec3::parse_rdata(key.clone(), &record.rdata).ok()?;
                if !target_in_interval(&key, &parsed.next_hashed_owner, target_hash) {
                    return None;
                }
                lru.touch(zones, GlobalDenialId { zone: zone_id, denial: id });
                return Some(FetchedNsec3 { denial: id, record, ttl, parsed });
            }
            None => {
                lru.remove_one(zones, GlobalDenialId { zone: zone_id, denial: id });
            }
        }
    }
    None
}

fn fetch_soa(
    zone_name: &Name,
    class: DNSResourceClass,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> Option<(DNSResource, u32)> {
    let (records, ttl) = rrset_cache.lookup(zone_name, DNSResourceType::SOA, class, now)?;
    let record = records.into_iter().find(|r| r.rtype == DNSResourceType::SOA)?;
    Some((record, ttl))
}

/// Reconstructs the NSEC3 record's real owner name (`<base32hash>.<zone>.`)
/// from its raw hash bytes, the key the RRset cache actually stores the
/// record under.
fn nsec3_owner_name(zone_name: &Name, hash: &[u8]) -> Option<Name> {
    let label = hash_to_text(hash);
    Name::parse(&format!("{label}.{}", zone_name.to_presentation())).ok()
}

/// Step 3: inspects an exact-match NSEC/NSEC3's type bitmap. Declines
/// (`NoProof`) if `qtype` is actually present (nothing to deny) or a
/// CNAME/DNAME bit is set (a synthesized NODATA would be wrong — the name
/// redirects rather than lacking the type).
fn nodata_reply(
    exact_record: DNSResource,
    exact_ttl: u32,
    bitmap: &RecordTypeBitmap,
    qtype: DNSResourceType,
    zone_name: &Name,
    class: DNSResourceClass,
    rrset_cache: &dyn RrsetCache,
    now: u64,
) -> SynthesisOutcome {
    if bitmap.contains(qtype) {
        return SynthesisOutcome::NoProof;
    }
    if bitmap.contains(DNSResourceType::CNAME) || bitmap.contains(DNSResourceType::DNAME) {
        return SynthesisOutcome::NoProof;
    }
    let Some((soa_record, soa_ttl)) = fetch_soa(zone_name, class, rrset_cache, now) else {
        return SynthesisOutcome::NoProof;
    };
    let ttl = exact_ttl.min(soa_ttl);
    finalize(ResponseCode::NoError, Vec::new(), vec![exact_record, soa_record], ttl)
}

fn finalize(rcode: ResponseCode, answers: Vec<DNSResource>, authorities: Vec<DNSResource>, ttl: u32) -> SynthesisOutcome {
    let stamp = |mut r: DNSResource| {
        r.ttl = ttl;
        r
    };
    SynthesisOutcome::Reply(SynthesizedMessage {
        rcode,
        answers: answers.into_iter().map(stamp).collect(),
        authorities: authorities.into_iter().map(stamp).collect(),
    })
}
