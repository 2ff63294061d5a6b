pub mod nsec;

pub use nsec::{HashAlgorithm, Nsec, Nsec3, Nsec3Param, RecordTypeBitmap, compute_nsec3_hash};
