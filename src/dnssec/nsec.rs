//! NSEC / NSEC3 / NSEC3PARAM rdata value types, the RFC 4034/3845/5155 type
//! bitmap codec, and NSEC3 hashing.
//!
//! The owner-name-to-hash computation is grounded on the teacher's
//! `dnssec::denial::DenialOfExistenceValidator::compute_nsec3_hash`; the
//! type bitmap window-block parse/encode algorithm is grounded on
//! `other_examples` toluol's `rdata/nsec.rs` (`parse_type_bitmap` /
//! `encode_type_bitmap_into`); the NSEC3/NSEC3PARAM field layout mirrors
//! `other_examples` toluol's `rdata/nsec3.rs`.

use std::collections::BTreeMap;

use crate::dns::enums::DNSResourceType;
use crate::error::RdataError;
use crate::name::Name;

/// NSEC3 hash algorithm (RFC 5155 §11.1). Only SHA-1 is assigned; anything
/// else is rejected rather than silently accepted, matching the teacher's
/// `compute_nsec3_hash`/`validate_nsec3_denial` behavior of only proceeding
/// for algorithm 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Result<Self, RdataError> {
        match value {
            1 => Ok(Self::Sha1),
            other => Err(RdataError::UnsupportedHashAlgorithm(other)),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Sha1 => 1,
        }
    }
}

/// A set of RR types present at a name, as carried in an NSEC/NSEC3 type
/// bitmap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordTypeBitmap {
    present: Vec<u16>,
}

impl RecordTypeBitmap {
    pub fn from_types(types: impl IntoIterator<Item = DNSResourceType>) -> Self {
        let mut present: Vec<u16> = types.into_iter().map(u16::from).collect();
        present.sort_unstable();
        present.dedup();
        Self { present }
    }

    pub fn from_raw_numbers(numbers: impl IntoIterator<Item = u16>) -> Self {
        let mut present: Vec<u16> = numbers.into_iter().collect();
        present.sort_unstable();
        present.dedup();
        Self { present }
    }

    pub fn contains(&self, rtype: DNSResourceType) -> bool {
        self.present.binary_search(&u16::from(rtype)).is_ok()
    }

    pub fn contains_raw(&self, type_number: u16) -> bool {
        self.present.binary_search(&type_number).is_ok()
    }

    pub fn types(&self) -> impl Iterator<Item = u16> + '_ {
        self.present.iter().copied()
    }

    /// Parses the window-block-encoded type bitmap occupying the rest of
    /// `bytes`. Window blocks are `window_number:u8, bitmap_len:u8,
    /// bitmap_len bytes`, repeated until the slice is exhausted.
    pub fn parse(bytes: &[u8]) -> Result<Self, RdataError> {
        let mut present = Vec::new();
        let mut offset = 0usize;
        let mut last_window: Option<u8> = None;
        while offset < bytes.len() {
            if offset + 2 > bytes.len() {
                return Err(RdataError::Truncated("type bitmap window header"));
            }
            let window_number = bytes[offset];
            let bitmap_len = bytes[offset + 1] as usize;
            offset += 2;
            if let Some(last) = last_window {
                if window_number <= last {
                    return Err(RdataError::BitmapWindowOutOfOrder);
                }
            }
            last_window = Some(window_number);
            if offset + bitmap_len > bytes.len() {
                return Err(RdataError::Truncated("type bitmap window body"));
            }
            for (i, byte) in bytes[offset..offset + bitmap_len].iter().enumerate() {
                for bit in 0..8u16 {
                    if byte & (0x80 >> bit) != 0 {
                        let type_num = (window_number as u16) << 8 | (i as u16 * 8 + bit);
                        present.push(type_num);
                    }
                }
            }
            offset += bitmap_len;
        }
        Ok(Self { present })
    }

    /// Encodes as window blocks, trimming each block to its last nonzero
    /// byte the way authoritative servers do.
    pub fn encode(&self) -> Vec<u8> {
        let mut windows: BTreeMap<u8, [u8; 32]> = BTreeMap::new();
        for &type_num in &self.present {
            let window = (type_num >> 8) as u8;
            let byte_in_window = (type_num & 0xff) / 8;
            let bit = (type_num & 0xff) % 8;
            let block = windows.entry(window).or_insert([0u8; 32]);
            block[byte_in_window as usize] |= 0x80 >> bit;
        }

        let mut out = Vec::new();
        for (window, block) in windows {
            let used_len = block.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
            if used_len == 0 {
                continue;
            }
            out.push(window);
            out.push(used_len as u8);
            out.extend_from_slice(&block[..used_len]);
        }
        out
    }
}

/// An NSEC record's denial-relevant fields (RFC 4034 §4.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nsec {
    pub owner: Name,
    pub next_owner: Name,
    pub types: RecordTypeBitmap,
}

impl Nsec {
    /// Decodes an NSEC record's RDATA: an uncompressed next-domain-name
    /// field followed by the type bitmap (RFC 4034 §4.1). Grounded on
    /// `other_examples` toluol's `rdata/nsec.rs::parse_type_bitmap`, with
    /// the next-name field decoded via [`Name::from_wire`] since RFC 4034
    /// §4.1.3 forbids compressing it.
    pub fn parse_rdata(owner: Name, rdata: &[u8]) -> Result<Self, RdataError> {
        let (next_owner, consumed) = Name::from_wire(rdata)?;
        let types = RecordTypeBitmap::parse(&rdata[consumed..])?;
        Ok(Self {
            owner,
            next_owner,
            types,
        })
    }
}

/// An NSEC3 record's denial-relevant fields (RFC 5155 §3). `owner_hash` and
/// `next_hashed_owner` are raw hash bytes, not base32 text — raw-byte `Ord`
/// already matches RFC 5155 §7.2 hash ordering, so no extra encoding step
/// is needed for range comparisons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nsec3 {
    pub owner_hash: Vec<u8>,
    pub hash_algorithm: HashAlgorithm,
    pub opt_out: bool,
    pub iterations: u16,
    pub salt: Vec<u8>,
    pub next_hashed_owner: Vec<u8>,
    pub types: RecordTypeBitmap,
}

impl Nsec3 {
    /// Decodes an NSEC3 record's RDATA (RFC 5155 §3): hash algorithm,
    /// flags (only the opt-out bit is defined), iterations, salt, next
    /// hashed owner, type bitmap. `owner_hash` is the already-hashed owner
    /// name, recovered by the caller from the record's base32 leftmost
    /// label (RFC 5155 §7.2), not from this RDATA. Grounded on
    /// `other_examples` toluol's `rdata/nsec3.rs::parse_rdata`.
    pub fn parse_rdata(owner_hash: Vec<u8>, rdata: &[u8]) -> Result<Self, RdataError> {
        let hash_algorithm = HashAlgorithm::from_u8(*rdata.first().ok_or(RdataError::Truncated("hash algorithm"))?)?;
        let flags = *rdata.get(1).ok_or(RdataError::Truncated("flags"))?;
        let opt_out = flags & 0x01 != 0;
        let iterations = u16::from_be_bytes(
            rdata
                .get(2..4)
                .ok_or(RdataError::Truncated("iterations"))?
                .try_into()
                .unwrap(),
        );
        let salt_len = *rdata.get(4).ok_or(RdataError::Truncated("salt length"))? as usize;
        let mut offset = 5;
        let salt = rdata
            .get(offset..offset + salt_len)
            .ok_or(RdataError::Truncated("salt"))?
            .to_vec();
        offset += salt_len;
        let hash_len = *rdata.get(offset).ok_or(RdataError::Truncated("hash length"))? as usize;
        offset += 1;
        let next_hashed_owner = rdata
            .get(offset..offset + hash_len)
            .ok_or(RdataError::Truncated("next hashed owner"))?
            .to_vec();
        offset += hash_len;
        let types = RecordTypeBitmap::parse(&rdata[offset..])?;
        Ok(Self {
            owner_hash,
            hash_algorithm,
            opt_out,
            iterations,
            salt,
            next_hashed_owner,
            types,
        })
    }
}

/// A zone's NSEC3 parameters (RFC 5155 §4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nsec3Param {
    pub hash_algorithm: HashAlgorithm,
    pub iterations: u16,
    pub salt: Vec<u8>,
}

impl Nsec3Param {
    /// Decodes an NSEC3PARAM record's RDATA (RFC 5155 §4): hash algorithm,
    /// flags, iterations, salt. No type bitmap (NSEC3PARAM is apex
    /// metadata, not a denial record).
    pub fn parse_rdata(rdata: &[u8]) -> Result<Self, RdataError> {
        let hash_algorithm = HashAlgorithm::from_u8(*rdata.first().ok_or(RdataError::Truncated("hash algorithm"))?)?;
        let iterations = u16::from_be_bytes(
            rdata
                .get(2..4)
                .ok_or(RdataError::Truncated("iterations"))?
                .try_into()
                .unwrap(),
        );
        let salt_len = *rdata.get(4).ok_or(RdataError::Truncated("salt length"))? as usize;
        let salt = rdata
            .get(5..5 + salt_len)
            .ok_or(RdataError::Truncated("salt"))?
            .to_vec();
        Ok(Self {
            hash_algorithm,
            iterations,
            salt,
        })
    }
}

/// Computes the NSEC3 hash of `name` under `(iterations, salt)`, per RFC
/// 5155 §5: `IH(salt, x, 0) = H(x || salt)`, `IH(salt, x, k) = H(IH(salt, x,
/// k-1) || salt)`, returning `IH(salt, owner name, iterations)`.
///
/// Encodes `name` the way the teacher does for this specific purpose
/// (lower-cased wire-format labels, each length-prefixed, terminated by the
/// root byte) — note this is deliberately NOT the same encoding as
/// [`crate::name::Name::sort_key`], which is NUL-terminated rather than
/// length-prefixed; NSEC3 hashing requires the actual wire form.
pub fn compute_nsec3_hash(name: &Name, iterations: u16, salt: &[u8]) -> Vec<u8> {
    let mut wire_name = Vec::new();
    for label in name.labels() {
        wire_name.push(label.len() as u8);
        wire_name.extend_from_slice(label);
    }
    wire_name.push(0);

    let mut hash_input = wire_name;
    hash_input.extend_from_slice(salt);
    let mut hash = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, &hash_input);

    for _ in 0..iterations {
        let mut next_input = hash.as_ref().to_vec();
        next_input.extend_from_slice(salt);
        hash = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, &next_input);
    }

    hash.as_ref().to_vec()
}

/// Renders an NSEC3 owner hash as the lower-case base32 (RFC 4648, no
/// padding) text used in presentation format and as a zone's denial-index
/// key text, matching the teacher's `compute_nsec3_hash`'s final encoding
/// step.
pub fn hash_to_text(hash: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, hash).to_lowercase()
}

/// Decodes an NSEC3 owner name's leftmost label (base32hex, RFC 5155 §1,
/// case-insensitive) back into raw hash bytes.
pub fn hash_from_label(label: &[u8]) -> Result<Vec<u8>, RdataError> {
    let text = std::str::from_utf8(label)
        .map_err(|_| RdataError::Truncated("nsec3 owner label"))?
        .to_ascii_uppercase();
    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &text)
        .ok_or(RdataError::Truncated("nsec3 owner label"))
}
