//! Plain resource-record data shape, the unit ingest and synthesis both
//! operate on. Wire decoding into this shape is the external parser's job.

use super::enums::{DNSResourceClass, DNSResourceType};
use crate::name::Name;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DNSResource {
    pub owner: Name,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
    /// Space-joined presentation-format rdata, when the caller's parser
    /// already rendered one (used for SOA field extraction, matching the
    /// teacher's `parsed_rdata` convention).
    pub parsed_rdata: Option<String>,
}

impl DNSResource {
    /// Extracts SOA record fields (MNAME RNAME SERIAL REFRESH RETRY EXPIRE
    /// MINIMUM) from `parsed_rdata`, the way the teacher's
    /// `get_soa_fields` does.
    pub fn get_soa_fields(&self) -> Option<(String, String, u32, u32, u32, u32, u32)> {
        if self.rtype != DNSResourceType::SOA {
            return None;
        }
        let parsed = self.parsed_rdata.as_ref()?;
        let parts: Vec<&str> = parsed.split(' ').collect();
        if parts.len() != 7 {
            return None;
        }
        let (serial, refresh, retry, expire, minimum) = (
            parts[2].parse::<u32>().ok()?,
            parts[3].parse::<u32>().ok()?,
            parts[4].parse::<u32>().ok()?,
            parts[5].parse::<u32>().ok()?,
            parts[6].parse::<u32>().ok()?,
        );
        Some((
            parts[0].to_string(),
            parts[1].to_string(),
            serial,
            refresh,
            retry,
            expire,
            minimum,
        ))
    }

    /// The SOA MINIMUM field, used as the negative-caching TTL per RFC 2308.
    pub fn get_soa_minimum(&self) -> Option<u32> {
        self.get_soa_fields().map(|fields| fields.6)
    }
}
