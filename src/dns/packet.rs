//! The owned message shape ingest reads from and synthesis builds.
//!
//! Matches the field names actually used in the teacher's
//! `dnssec::denial::validate_denial` and `cache::DnsCache` (`.header`,
//! `.questions`, `.answers`, `.authorities`, `.resources` for additional) —
//! `resources` is kept as the additional-section field name for that
//! reason even though `authorities`/`answers` read more naturally plural.

use super::header::DNSHeader;
use super::question::DNSQuestion;
use super::resource::DNSResource;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

impl DNSPacket {
    pub fn new(header: DNSHeader) -> Self {
        Self {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            resources: Vec::new(),
        }
    }
}
