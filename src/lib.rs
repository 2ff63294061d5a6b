pub mod arena;
pub mod cache;
pub mod collab;
pub mod config;
pub mod denial;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod ingest;
pub mod lru;
pub mod name;
pub mod synthesis;
pub mod zone;

pub use collab::{RrsetCache, RrsetHandle};
pub use dns::DNSPacket;
pub use name::Name;
pub use synthesis::{DlvOutcome, SynthesisOutcome};
