//! The ingest path (SPEC_FULL.md §4.5): accepts an already-validated reply
//! and attaches its NSEC/NSEC3 owner names to the correct zone's denial
//! index, touching the LRU governor.
//!
//! Grounded on the teacher's `dnssec::denial::validate_nsec_denial`/
//! `validate_nsec3_denial` for how NSEC/NSEC3 records are pulled out of a
//! packet's authority section, and `cache::mod::extract_soa_minimum_ttl`'s
//! "derive zone bookkeeping from the authority section's SOA" idiom.
//!
//! Per the external contract (§7), ingest never surfaces errors to its
//! caller: [`add_reply`] and [`add_referral`] always return `()`, logging
//! the reason at debug level and aborting the current operation without
//! partial side effects when something goes wrong.

use tracing::debug;

use crate::denial::GlobalDenialId;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::packet::DNSPacket;
use crate::dns::resource::DNSResource;
use crate::dnssec::nsec::{Nsec, Nsec3, Nsec3Param, hash_from_label};
use crate::error::IngestError;
use crate::lru::LruList;
use crate::name::Name;
use crate::zone::{ZoneId, ZoneIndex, ZoneParams};

/// Ingests a full (non-referral) validated reply. The applicable zone is
/// derived from the SOA owner in the authority section.
pub fn add_reply(zones: &mut ZoneIndex, lru: &mut LruList, nsec3_max_iter: u16, reply: &DNSPacket) {
    if let Err(err) = ingest(zones, lru, nsec3_max_iter, reply, None) {
        debug!(%err, "ingest aborted");
    }
}

/// Ingests a validated referral, with the bailiwick zone name supplied
/// explicitly rather than derived from an authority-section SOA (referrals
/// carry the child zone's NS/DS/NSEC records, not a SOA).
pub fn add_referral(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    nsec3_max_iter: u16,
    reply: &DNSPacket,
    bailiwick: &Name,
) {
    let class = reply
        .questions
        .first()
        .map(|q| q.qclass)
        .unwrap_or(DNSResourceClass::IN);
    if let Err(err) = ingest(zones, lru, nsec3_max_iter, reply, Some((bailiwick.clone(), class))) {
        debug!(%err, "referral ingest aborted");
    }
}

fn ingest(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    nsec3_max_iter: u16,
    reply: &DNSPacket,
    zone_override: Option<(Name, DNSResourceClass)>,
) -> Result<(), IngestError> {
    let (zone_name, class) = match zone_override {
        Some(pair) => pair,
        None => {
            let soa = reply
                .authorities
                .iter()
                .find(|r| r.rtype == DNSResourceType::SOA)
                .ok_or(IngestError::NoApplicableZone)?;
            (soa.owner.clone(), soa.rclass)
        }
    };

    let Some(params) = determine_params(reply, &zone_name, nsec3_max_iter)? else {
        // No NSEC/NSEC3 material at all in this reply; nothing to do.
        return Ok(());
    };

    if let Some(existing) = zones.find_zone(class, &zone_name) {
        if zones.node(existing).params.as_ref() != Some(&params) {
            lru.purge_zone(zones, existing);
        }
    }
    let (zone_id, _freed) = zones.ensure_zone(class, &zone_name, params.clone());

    for record in &reply.authorities {
        if !(record.owner == zone_name || record.owner.is_strict_subdomain_of(&zone_name)) {
            continue;
        }
        let result = match record.rtype {
            DNSResourceType::NSEC if matches!(params, ZoneParams::PlainNsec) => {
                insert_nsec(zones, lru, zone_id, record)
            }
            DNSResourceType::NSEC3 if matches!(params, ZoneParams::Nsec3(_)) => {
                insert_nsec3(zones, lru, zone_id, record)
            }
            _ => Ok(()),
        };
        // A single malformed denial record is dropped on its own (ingest is
        // best-effort, §4.5); it does not abort the rest of the reply.
        if let Err(err) = result {
            debug!(%err, owner = %record.owner, "dropping malformed denial record");
        }
    }

    lru.evict_to_cap(zones);
    Ok(())
}

fn insert_nsec(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    record: &DNSResource,
) -> Result<(), IngestError> {
    Nsec::parse_rdata(record.owner.clone(), &record.rdata)?;
    let (denial, bytes, promoted) = zones.node_mut(zone_id).denials.insert_nsec(&record.owner);
    let gid = GlobalDenialId { zone: zone_id, denial };
    if bytes > 0 {
        lru.insert(zones, gid, bytes);
    } else {
        lru.touch(zones, gid);
    }
    // Ancestors that just gained their first in-use descendant are no
    // longer leaf-in-use and must drop out of the recency list (SPEC §3
    // invariant 4), even though they stay in-use and byte-counted.
    for ancestor in promoted {
        lru.unlink_only(zones, GlobalDenialId { zone: zone_id, denial: ancestor });
    }
    Ok(())
}

fn insert_nsec3(
    zones: &mut ZoneIndex,
    lru: &mut LruList,
    zone_id: ZoneId,
    record: &DNSResource,
) -> Result<(), IngestError> {
    let leftmost = record
        .owner
        .labels()
        .first()
        .ok_or(IngestError::NoApplicableZone)?;
    let owner_hash = hash_from_label(leftmost)?;
    Nsec3::parse_rdata(owner_hash.clone(), &record.rdata)?;
    let (denial, bytes) = zones.node_mut(zone_id).denials.insert_nsec3(owner_hash);
    let gid = GlobalDenialId { zone: zone_id, denial };
    if bytes > 0 {
        lru.insert(zones, gid, bytes);
    } else {
        lru.touch(zones, gid);
    }
    Ok(())
}

/// Works out which [`ZoneParams`] this reply implies for `zone_name`:
/// an explicit NSEC3PARAM record at the apex takes priority; otherwise the
/// parameters are read off the first NSEC3 record present (RFC 5155 §3
/// repeats hash algorithm/iterations/salt on every NSEC3, not just
/// NSEC3PARAM); otherwise, any NSEC record implies the plain-NSEC
/// sentinel. Returns `None` if the reply carries no denial material at
/// all. Per SPEC_FULL.md §7 item 5, iterations exceeding the configured
/// cap abort the whole ingest rather than merely dropping one record,
/// matching scenario 4: "existing entries remain" means no partial
/// mutation happened.
fn determine_params(
    reply: &DNSPacket,
    zone_name: &Name,
    nsec3_max_iter: u16,
) -> Result<Option<ZoneParams>, IngestError> {
    if let Some(param_rr) = reply
        .authorities
        .iter()
        .find(|r| r.rtype == DNSResourceType::NSEC3PARAM && r.owner == *zone_name)
    {
        let params = Nsec3Param::parse_rdata(&param_rr.rdata)?;
        check_iterations(&params, nsec3_max_iter)?;
        return Ok(Some(ZoneParams::Nsec3(params)));
    }

    if let Some(nsec3_rr) = reply.authorities.iter().find(|r| r.rtype == DNSResourceType::NSEC3) {
        let parsed = Nsec3::parse_rdata(Vec::new(), &nsec3_rr.rdata)?;
        let params = Nsec3Param {
            hash_algorithm: parsed.hash_algorithm,
            iterations: parsed.iterations,
            salt: parsed.salt,
        };
        check_iterations(&params, nsec3_max_iter)?;
        return Ok(Some(ZoneParams::Nsec3(params)));
    }

    if reply.authorities.iter().any(|r| r.rtype == DNSResourceType::NSEC) {
        return Ok(Some(ZoneParams::PlainNsec));
    }

    Ok(None)
}

fn check_iterations(params: &Nsec3Param, nsec3_max_iter: u16) -> Result<(), IngestError> {
    if params.iterations > nsec3_max_iter {
        return Err(IngestError::TooManyIterations(params.iterations, nsec3_max_iter));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceClass;
    use crate::dns::header::DNSHeader;
    use crate::dnssec::nsec::RecordTypeBitmap;

    fn nsec_rdata(next: &str, types: &[DNSResourceType]) -> Vec<u8> {
        let next_name = Name::parse(next).unwrap();
        let mut rdata = Vec::new();
        for label in next_name.labels() {
            rdata.push(label.len() as u8);
            rdata.extend_from_slice(label);
        }
        rdata.push(0);
        rdata.extend_from_slice(&RecordTypeBitmap::from_types(types.iter().copied()).encode());
        rdata
    }

    fn soa_record(owner: &str) -> DNSResource {
        DNSResource {
            owner: Name::parse(owner).unwrap(),
            rtype: DNSResourceType::SOA,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdata: Vec::new(),
            parsed_rdata: None,
        }
    }

    fn nsec_record(owner: &str, next: &str, types: &[DNSResourceType]) -> DNSResource {
        DNSResource {
            owner: Name::parse(owner).unwrap(),
            rtype: DNSResourceType::NSEC,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdata: nsec_rdata(next, types),
            parsed_rdata: None,
        }
    }

    #[test]
    fn plain_nsec_reply_inserts_denials() {
        let mut zones = ZoneIndex::new();
        let mut lru = LruList::new(1 << 20);

        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(soa_record("example."));
        reply
            .authorities
            .push(nsec_record("a.example.", "c.example.", &[DNSResourceType::A]));

        add_reply(&mut zones, &mut lru, 150, &reply);

        let zone = zones.find_zone(DNSResourceClass::IN, &Name::parse("example.").unwrap());
        assert!(zone.is_some());
        assert!(!zones.node(zone.unwrap()).denials.is_empty());
    }

    #[test]
    fn reply_without_soa_is_dropped_silently() {
        let mut zones = ZoneIndex::new();
        let mut lru = LruList::new(1 << 20);

        let mut reply = DNSPacket::new(DNSHeader::default());
        reply
            .authorities
            .push(nsec_record("a.example.", "c.example.", &[DNSResourceType::A]));

        add_reply(&mut zones, &mut lru, 150, &reply);
        assert_eq!(zones.zone_count(), 0);
    }

    #[test]
    fn idempotent_ingest_does_not_duplicate() {
        let mut zones = ZoneIndex::new();
        let mut lru = LruList::new(1 << 20);

        let mut reply = DNSPacket::new(DNSHeader::default());
        reply.authorities.push(soa_record("example."));
        reply
            .authorities
            .push(nsec_record("a.example.", "c.example.", &[DNSResourceType::A]));

        add_reply(&mut zones, &mut lru, 150, &reply);
        let used_after_first = lru.used_bytes();
        add_reply(&mut zones, &mut lru, 150, &reply);
        assert_eq!(lru.used_bytes(), used_after_first);
    }
}
