//! Content fingerprints for change detection between compilation passes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::contract::ContractKind;

/// Number of digest bytes carried by every signature (SHA-256).
const DIGEST_LEN: usize = 32;

/// How a [`Signature`] was derived.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SignatureKind {
    /// Hash of the contract's raw source bytes. Changes on any byte-level edit.
    Content,
    /// Hash of the contract's structural summary. Used when the source is unreadable.
    Structural,
}

impl SignatureKind {
    /// Returns the single-character prefix used in the textual form.
    pub fn prefix(self) -> char {
        match self {
            SignatureKind::Content => 'c',
            SignatureKind::Structural => 's',
        }
    }
}

/// A fixed-format fingerprint of a contract.
///
/// The textual form is `c:` or `s:` followed by 64 lowercase hex digits. Two
/// contracts with identical content always produce identical signatures.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature {
    kind: SignatureKind,
    digest: [u8; DIGEST_LEN],
}

impl Signature {
    /// Computes a content signature from the raw bytes backing a contract.
    pub fn from_content(data: &[u8]) -> Self {
        Self {
            kind: SignatureKind::Content,
            digest: Sha256::digest(data).into(),
        }
    }

    /// Computes a structural signature from a contract's shape summary.
    ///
    /// Only the kind, name, and member counts participate, so reordering
    /// members or editing bodies leaves it unchanged.
    pub fn structural(kind: ContractKind, name: &str, properties: usize, methods: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(properties.to_string().as_bytes());
        hasher.update([0]);
        hasher.update(methods.to_string().as_bytes());
        Self {
            kind: SignatureKind::Structural,
            digest: hasher.finalize().into(),
        }
    }

    /// Returns how this signature was derived.
    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    /// Returns `true` if this signature came from the structural fallback.
    pub fn is_structural(&self) -> bool {
        self.kind == SignatureKind::Structural
    }
}

/// Error returned when a string is not a well-formed signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseSignatureError {
    input: String,
}

impl fmt::Display for ParseSignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid signature '{}'", self.input)
    }
}

impl std::error::Error for ParseSignatureError {}

impl FromStr for Signature {
    type Err = ParseSignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSignatureError {
            input: s.to_string(),
        };
        let (prefix, digits) = s.split_once(':').ok_or_else(err)?;
        let kind = match prefix {
            "c" => SignatureKind::Content,
            "s" => SignatureKind::Structural,
            _ => return Err(err()),
        };
        // The textual form is canonical, so uppercase digits are rejected
        if digits.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(err());
        }
        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(digits, &mut digest).map_err(|_| err())?;
        Ok(Self { kind, digest })
    }
}

impl TryFrom<String> for Signature {
    type Error = ParseSignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), hex::encode(self.digest))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature({}:{:02x}{:02x}..)",
            self.kind.prefix(),
            self.digest[0],
            self.digest[1]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_deterministic() {
        let a = Signature::from_content(b"interface UserRepository");
        let b = Signature::from_content(b"interface UserRepository");
        assert_eq!(a, b);
        assert_eq!(a.kind(), SignatureKind::Content);
    }

    #[test]
    fn whitespace_edit_changes_content_signature() {
        let a = Signature::from_content(b"interface A { fun f() }");
        let b = Signature::from_content(b"interface A {  fun f() }");
        assert_ne!(a, b);
    }

    #[test]
    fn comment_edit_changes_content_signature() {
        let a = Signature::from_content(b"interface A\n");
        let b = Signature::from_content(b"// docs\ninterface A\n");
        assert_ne!(a, b);
    }

    #[test]
    fn structural_ignores_everything_but_counts() {
        let a = Signature::structural(ContractKind::Interface, "com.x.A", 2, 3);
        let b = Signature::structural(ContractKind::Interface, "com.x.A", 2, 3);
        assert_eq!(a, b);
        assert!(a.is_structural());

        let more_methods = Signature::structural(ContractKind::Interface, "com.x.A", 2, 4);
        assert_ne!(a, more_methods);

        let as_class = Signature::structural(ContractKind::Class, "com.x.A", 2, 3);
        assert_ne!(a, as_class);
    }

    #[test]
    fn content_and_structural_never_collide() {
        let content = Signature::from_content(b"x");
        let structural = Signature::structural(ContractKind::Interface, "x", 0, 0);
        assert_ne!(content, structural);
    }

    #[test]
    fn display_is_fixed_format() {
        let s = Signature::from_content(b"test").to_string();
        assert_eq!(s.len(), 2 + 64);
        assert!(s.starts_with("c:"));
        assert!(s[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_roundtrip() {
        let sig = Signature::structural(ContractKind::Class, "com.x.B", 1, 1);
        let parsed: Signature = sig.to_string().parse().unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("".parse::<Signature>().is_err());
        assert!("c:abc".parse::<Signature>().is_err());
        assert!(format!("x:{}", "0".repeat(64)).parse::<Signature>().is_err());
        assert!(format!("c:{}", "G".repeat(64)).parse::<Signature>().is_err());
        assert!(format!("c:{}", "A".repeat(64)).parse::<Signature>().is_err());
    }

    #[test]
    fn parse_decodes_digest_bytes() {
        let text = format!("c:{}ff", "00".repeat(DIGEST_LEN - 1));
        let sig: Signature = text.parse().unwrap();
        assert_eq!(sig.digest[DIGEST_LEN - 1], 0xff);
        assert!(sig.digest[..DIGEST_LEN - 1].iter().all(|&b| b == 0));
        assert_eq!(sig.to_string(), text);

        let too_long = format!("c:{}", "0".repeat(DIGEST_LEN * 2 + 2));
        assert!(too_long.parse::<Signature>().is_err());
        let odd = format!("c:{}", "0".repeat(DIGEST_LEN * 2 - 1));
        assert!(odd.parse::<Signature>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let sig = Signature::from_content(b"serde");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{sig}\""));
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn debug_abbreviated() {
        let s = format!("{:?}", Signature::from_content(b"test"));
        assert!(s.starts_with("Signature(c:"));
        assert!(s.ends_with("..)"));
    }
}
