//! Crate-level error types.
//!
//! Split the way the teacher splits `dnssec::errors::DnsSecError` from the
//! umbrella `HeimdallError`: small, focused enums per concern, all derived
//! with `thiserror` rather than hand-rolled `Display` impls.

use thiserror::Error;

/// Errors from parsing or constructing a [`crate::name::Name`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("label exceeds 63 octets ({0})")]
    LabelTooLong(usize),
    #[error("name exceeds 255 octets ({0})")]
    NameTooLong(usize),
    #[error("empty label in name")]
    EmptyLabel,
}

/// Errors from decoding NSEC/NSEC3/NSEC3PARAM rdata.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RdataError {
    #[error("rdata truncated while reading {0}")]
    Truncated(&'static str),
    #[error("unsupported NSEC3 hash algorithm {0}")]
    UnsupportedHashAlgorithm(u8),
    #[error("type bitmap window number decreased mid-record")]
    BitmapWindowOutOfOrder,
    #[error("invalid name: {0}")]
    Name(#[from] NameError),
}

/// Errors surfaced from ingest. Per the external contract, ingest never
/// propagates these to its caller — they exist so the internal machinery
/// has a typed way to abort an operation and so tests can assert on why.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("could not determine the applicable zone for this reply")]
    NoApplicableZone,
    #[error("invalid name in reply: {0}")]
    Name(#[from] NameError),
    #[error("invalid rdata in reply: {0}")]
    Rdata(#[from] RdataError),
    #[error("NSEC3 iterations {0} exceed configured maximum {1}")]
    TooManyIterations(u16, u16),
}

/// Errors from [`crate::synthesis`]'s message-assembly step. Reserved for
/// resource exhaustion; missing or expired proofs are not errors, they are
/// the `no_proof` branch of [`crate::synthesis::SynthesisOutcome`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("failed to assemble synthesized reply")]
    Assembly,
}
