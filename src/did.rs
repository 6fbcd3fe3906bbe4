use std::str::FromStr;

use crate::Error;

/// The DID method this engine operates on.  The method is a constant of the
/// system; identifiers carrying any other method are rejected at parse time.
pub const DID_METHOD: &str = "idchain";

/// A decentralized identifier, canonical string form
/// `did:idchain:<method-specific-id>`.
///
/// Equality, ordering, and hashing are defined by the method-specific id
/// alone, since the method is constant for this system.
#[derive(Clone, Debug)]
pub struct DID {
    method: String,
    method_specific_id: String,
}

impl DID {
    /// Construct a DID from a method-specific id.
    pub fn new(method_specific_id: &str) -> Result<Self, Error> {
        if method_specific_id.is_empty() {
            return Err(Error::MalformedDID("empty method-specific id".into()));
        }
        if !method_specific_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::MalformedDID(
                "method-specific id must be alphanumeric".into(),
            ));
        }
        Ok(Self {
            method: DID_METHOD.to_string(),
            method_specific_id: method_specific_id.to_string(),
        })
    }
    /// Construct the DID whose method-specific id is the address derived from
    /// the given verifying key.  This is how a primitive DID is born.
    pub fn from_key(verifying_key_bytes: &[u8]) -> Self {
        Self {
            method: DID_METHOD.to_string(),
            method_specific_id: crate::crypto::address_from_key(verifying_key_bytes),
        }
    }
    pub fn method(&self) -> &str {
        &self.method
    }
    pub fn method_specific_id(&self) -> &str {
        &self.method_specific_id
    }
}

impl std::fmt::Display for DID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "did:{}:{}", self.method, self.method_specific_id)
    }
}

impl FromStr for DID {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("did:")
            .ok_or(Error::MalformedDID("missing 'did:' scheme".into()))?;
        let (method, method_specific_id) = rest
            .split_once(':')
            .ok_or(Error::MalformedDID("missing method-specific id".into()))?;
        if method != DID_METHOD {
            return Err(Error::MalformedDID("unsupported DID method".into()));
        }
        Self::new(method_specific_id)
    }
}

impl PartialEq for DID {
    fn eq(&self, other: &Self) -> bool {
        self.method_specific_id == other.method_specific_id
    }
}

impl Eq for DID {}

impl PartialOrd for DID {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DID {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.method_specific_id.cmp(&other.method_specific_id)
    }
}

impl std::hash::Hash for DID {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.method_specific_id.hash(state);
    }
}

impl serde::Serialize for DID {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DID {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
