//! Trimmed resource type/class enums.
//!
//! The teacher's `dns::enums` module carries ~150 `DNSResourceType`
//! variants (LOC, NAPTR, HIP, EUI48, …) for a full-featured resolver. This
//! crate only needs the types denial-of-existence reasoning actually
//! touches: the core query types a NODATA proof might be about, the
//! DNSSEC chain types, and the handful of others exercised by the test
//! scenarios. Trimmed deliberately; see DESIGN.md.

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceType {
    #[default]
    Unknown,
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    HINFO,
    MX,
    TXT,
    AAAA,
    SRV,
    SSHFP,
    TLSA,
    HTTPS,
    SVCB,
    CAA,
    DS,
    DNSKEY,
    NSEC,
    NSEC3,
    NSEC3PARAM,
    RRSIG,
    DNAME,
    TSIG,
    OPT,
    ANY,
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            6 => Self::SOA,
            12 => Self::PTR,
            13 => Self::HINFO,
            15 => Self::MX,
            16 => Self::TXT,
            28 => Self::AAAA,
            33 => Self::SRV,
            39 => Self::DNAME,
            41 => Self::OPT,
            43 => Self::DS,
            44 => Self::SSHFP,
            46 => Self::RRSIG,
            47 => Self::NSEC,
            48 => Self::DNSKEY,
            50 => Self::NSEC3,
            51 => Self::NSEC3PARAM,
            52 => Self::TLSA,
            64 => Self::SVCB,
            65 => Self::HTTPS,
            250 => Self::TSIG,
            255 => Self::ANY,
            257 => Self::CAA,
            _ => Self::Unknown,
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(value: DNSResourceType) -> Self {
        match value {
            DNSResourceType::Unknown => 0,
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::HINFO => 13,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::DNAME => 39,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::SSHFP => 44,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::NSEC => 47,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::NSEC3 => 50,
            DNSResourceType::NSEC3PARAM => 51,
            DNSResourceType::TLSA => 52,
            DNSResourceType::SVCB => 64,
            DNSResourceType::HTTPS => 65,
            DNSResourceType::TSIG => 250,
            DNSResourceType::ANY => 255,
            DNSResourceType::CAA => 257,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    Unknown,
    IN,
    CS,
    CH,
    HS,
    ANY,
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::IN,
            2 => Self::CS,
            3 => Self::CH,
            4 => Self::HS,
            255 => Self::ANY,
            _ => Self::Unknown,
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(value: DNSResourceClass) -> Self {
        match value {
            DNSResourceClass::Unknown => 0,
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::ANY => 255,
        }
    }
}

/// Response codes relevant to synthesized replies (RFC 1035 §4.1.1).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    #[default]
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
}

impl From<ResponseCode> for u8 {
    fn from(value: ResponseCode) -> Self {
        match value {
            ResponseCode::NoError => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
        }
    }
}
