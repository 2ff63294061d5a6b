//! Canonical DNS name representation and ordering.
//!
//! Denial-of-existence reasoning lives and dies by RFC 4034 §6.1 canonical
//! name ordering: the zone index, the per-zone denial index, and the
//! covering-interval search in [`crate::denial`] all rely on comparing names
//! the canonical way rather than as plain strings.

use crate::error::NameError;

/// Maximum encoded length of a DNS name (RFC 1035 §3.1).
pub const MAX_NAME_OCTETS: usize = 255;
/// Maximum length of a single label.
pub const MAX_LABEL_OCTETS: usize = 63;

/// A DNS name, stored as lower-cased labels from the leftmost label to the
/// root, plus a precomputed canonical sort key.
///
/// The sort key is built root-first: each label is case-folded and emitted
/// as `label-bytes || 0x00`, concatenated from the root down to the
/// leftmost label. Plain byte-vector `Ord` over that key reproduces RFC
/// 4034 canonical order, including the rule that the absence of an octet
/// sorts before a zero-value octet — the `0x00` terminator only ever
/// competes against the *next* label's first content byte, never a byte of
/// the same label, so shorter-common-prefix names still sort first.
#[derive(Clone, Debug, Eq)]
pub struct Name {
    labels: Vec<Vec<u8>>,
    sort_key: Vec<u8>,
}

impl Name {
    /// Parses a presentation-format name (`www.example.com.` or
    /// `www.example.com`, trailing dot optional) into canonical form.
    pub fn parse(text: &str) -> Result<Self, NameError> {
        if text == "." {
            return Ok(Self::root());
        }
        let trimmed = text.strip_suffix('.').unwrap_or(text);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut labels = Vec::new();
        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(NameError::EmptyLabel);
            }
            if label.len() > MAX_LABEL_OCTETS {
                return Err(NameError::LabelTooLong(label.len()));
            }
            labels.push(label.as_bytes().to_ascii_lowercase());
        }
        let name = Self::from_labels(labels)?;
        Ok(name)
    }

    /// Builds a name from already-lowercased label byte vectors, leftmost
    /// label first.
    pub fn from_labels(labels: Vec<Vec<u8>>) -> Result<Self, NameError> {
        let total: usize = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
        if total > MAX_NAME_OCTETS {
            return Err(NameError::NameTooLong(total));
        }
        let sort_key = Self::build_sort_key(&labels);
        Ok(Self { labels, sort_key })
    }

    pub fn root() -> Self {
        Self {
            labels: Vec::new(),
            sort_key: Vec::new(),
        }
    }

    fn build_sort_key(labels: &[Vec<u8>]) -> Vec<u8> {
        let mut key = Vec::with_capacity(labels.iter().map(|l| l.len() + 1).sum());
        for label in labels.iter().rev() {
            key.extend_from_slice(label);
            key.push(0);
        }
        key
    }

    /// The canonical sort key; `Ord` on this key matches RFC 4034 §6.1.
    pub fn sort_key(&self) -> &[u8] {
        &self.sort_key
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    /// True if `self` is a strict subdomain of `other` (more labels, and the
    /// trailing labels match `other` exactly).
    pub fn is_strict_subdomain_of(&self, other: &Name) -> bool {
        if self.labels.len() <= other.labels.len() {
            return false;
        }
        let offset = self.labels.len() - other.labels.len();
        self.labels[offset..] == other.labels[..]
    }

    /// Returns the name formed by prepending `*` as a new leftmost label,
    /// i.e. the wildcard owner for this name used as a closest encloser.
    pub fn wildcard_child(&self) -> Result<Name, NameError> {
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(b"*".to_vec());
        labels.extend(self.labels.iter().cloned());
        Name::from_labels(labels)
    }

    /// Returns the nearest strict ancestor name (one label removed), or
    /// `None` if `self` is already the root.
    pub fn parent(&self) -> Option<Name> {
        if self.labels.is_empty() {
            return None;
        }
        let labels = self.labels[1..].to_vec();
        Name::from_labels(labels).ok()
    }

    /// Parses an uncompressed wire-format name starting at `bytes[0]`
    /// (length-prefixed labels terminated by a zero-length root label).
    /// NSEC's "next domain name" field is required by RFC 4034 §4.1.3 to
    /// never use name compression, so this is the only wire form this
    /// crate ever needs to decode.
    ///
    /// Returns the parsed name and the number of bytes consumed.
    pub fn from_wire(bytes: &[u8]) -> Result<(Self, usize), NameError> {
        let mut labels = Vec::new();
        let mut offset = 0usize;
        loop {
            let len = *bytes.get(offset).ok_or(NameError::EmptyLabel)? as usize;
            if len & 0xc0 != 0 {
                // Compression pointer: not valid in an uncompressed field.
                return Err(NameError::EmptyLabel);
            }
            offset += 1;
            if len == 0 {
                break;
            }
            if len > MAX_LABEL_OCTETS {
                return Err(NameError::LabelTooLong(len));
            }
            let label = bytes
                .get(offset..offset + len)
                .ok_or(NameError::EmptyLabel)?;
            labels.push(label.to_ascii_lowercase());
            offset += len;
        }
        let name = Self::from_labels(labels)?;
        Ok((name, offset))
    }

    pub fn to_presentation(&self) -> String {
        if self.labels.is_empty() {
            return ".".to_string();
        }
        let mut out = String::new();
        for label in &self.labels {
            out.push_str(&String::from_utf8_lossy(label));
            out.push('.');
        }
        out
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key == other.sort_key
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sort_key.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key.cmp(&other.sort_key)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_presentation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_sorts_before_everything() {
        let root = Name::root();
        let example = Name::parse("example.").unwrap();
        assert!(root < example);
    }

    #[test]
    fn rfc4034_worked_example_order() {
        // RFC 4034 section 6.1's canonical ordering example.
        let names: Vec<Name> = [
            "example.",
            "a.example.",
            "yljkjljk.a.example.",
            "Z.a.example.",
            "zABC.a.EXAMPLE.",
            "z.example.",
            "\001.z.example.",
            "*.z.example.",
        ]
        .iter()
        .map(|s| Name::parse(s).unwrap())
        .collect();

        let mut sorted = names.clone();
        sorted.sort();
        for (original, expected) in sorted.iter().zip(names.iter()) {
            assert_eq!(original.sort_key(), expected.sort_key());
        }
    }

    #[test]
    fn shorter_label_content_can_sort_after_longer_common_prefix() {
        // "b" vs "aa": naive length-prefix comparison would say "b" < "aa"
        // because 1 < 2, but canonical order compares content first, so
        // "aa" < "b".
        let aa = Name::parse("aa.example.").unwrap();
        let b = Name::parse("b.example.").unwrap();
        assert!(aa < b);
    }

    #[test]
    fn strict_subdomain() {
        let parent = Name::parse("example.com.").unwrap();
        let child = Name::parse("www.example.com.").unwrap();
        assert!(child.is_strict_subdomain_of(&parent));
        assert!(!parent.is_strict_subdomain_of(&child));
        assert!(!parent.is_strict_subdomain_of(&parent));
    }

    #[test]
    fn wildcard_child_prepends_star() {
        let encloser = Name::parse("example.com.").unwrap();
        let wildcard = encloser.wildcard_child().unwrap();
        assert_eq!(wildcard.to_presentation(), "*.example.com.");
    }

    #[test]
    fn wire_round_trip() {
        let wire = [3, b'f', b'o', b'o', 3, b'c', b'o', b'm', 0];
        let (name, consumed) = Name::from_wire(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(name.to_presentation(), "foo.com.");
    }

    #[test]
    fn rejects_oversized_label() {
        let label = "a".repeat(64);
        let name = format!("{label}.example.");
        assert!(matches!(Name::parse(&name), Err(NameError::LabelTooLong(_))));
    }
}
