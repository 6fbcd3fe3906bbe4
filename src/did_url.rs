use std::str::FromStr;

use crate::{Error, DID};

/// A DID URL: a DID plus path, query, and fragment components addressing a
/// key, service, or credential within a document.
///
/// A DIDURL may be relative (no DID part) until qualified against a
/// containing document's subject; see [DIDURL::qualify_with].
///
/// Ordering is case-insensitive on the canonical string form (with a
/// case-sensitive tiebreak so that ordering stays consistent with equality);
/// this single ordering drives every sorted-by-id array in the canonical
/// document serialization.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DIDURL {
    did_o: Option<DID>,
    path_o: Option<String>,
    query_o: Option<String>,
    fragment_o: Option<String>,
}

impl DIDURL {
    /// A fragment-only DIDURL within the given DID, e.g. `did:idchain:abc#key-1`.
    pub fn with_fragment(did: DID, fragment: &str) -> Result<Self, Error> {
        if fragment.is_empty() {
            return Err(Error::MalformedDIDURL("empty fragment".into()));
        }
        Ok(Self {
            did_o: Some(did),
            path_o: None,
            query_o: None,
            fragment_o: Some(fragment.to_string()),
        })
    }
    /// A relative, fragment-only DIDURL, e.g. `#key-1`.
    pub fn relative_fragment(fragment: &str) -> Result<Self, Error> {
        if fragment.is_empty() {
            return Err(Error::MalformedDIDURL("empty fragment".into()));
        }
        Ok(Self {
            did_o: None,
            path_o: None,
            query_o: None,
            fragment_o: Some(fragment.to_string()),
        })
    }
    pub fn did_o(&self) -> Option<&DID> {
        self.did_o.as_ref()
    }
    /// The DID part.  Errors if this DIDURL is still relative.
    pub fn did(&self) -> Result<&DID, Error> {
        self.did_o
            .as_ref()
            .ok_or(Error::MalformedDIDURL("relative DIDURL has no DID part".into()))
    }
    pub fn path_o(&self) -> Option<&str> {
        self.path_o.as_deref()
    }
    pub fn query_o(&self) -> Option<&str> {
        self.query_o.as_deref()
    }
    pub fn fragment_o(&self) -> Option<&str> {
        self.fragment_o.as_deref()
    }
    /// True if this DIDURL has a DID part.
    pub fn is_qualified(&self) -> bool {
        self.did_o.is_some()
    }
    /// Set the DID part to the given subject if this DIDURL is relative.
    /// Idempotent on already-qualified DIDURLs.
    pub fn qualify_with(&mut self, subject: &DID) {
        if self.did_o.is_none() {
            self.did_o = Some(subject.clone());
        }
    }
    /// A copy of this DIDURL qualified against the given subject.
    pub fn qualified_with(&self, subject: &DID) -> Self {
        let mut did_url = self.clone();
        did_url.qualify_with(subject);
        did_url
    }
    /// The compact rendering: `#fragment` when the DID part equals the given
    /// subject (and there is no path or query), the full canonical string
    /// otherwise.
    pub fn to_compact_string(&self, subject: &DID) -> String {
        match (&self.did_o, &self.path_o, &self.query_o, &self.fragment_o) {
            (Some(did), None, None, Some(fragment)) if did == subject => {
                format!("#{}", fragment)
            }
            _ => self.to_string(),
        }
    }
}

impl std::fmt::Display for DIDURL {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(did) = &self.did_o {
            write!(f, "{}", did)?;
        }
        if let Some(path) = &self.path_o {
            write!(f, "/{}", path)?;
        }
        if let Some(query) = &self.query_o {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment_o {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl FromStr for DIDURL {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::MalformedDIDURL("empty DIDURL".into()));
        }
        let (rest, fragment_o) = match s.split_once('#') {
            Some((rest, fragment)) => {
                if fragment.is_empty() {
                    return Err(Error::MalformedDIDURL("empty fragment".into()));
                }
                (rest, Some(fragment.to_string()))
            }
            None => (s, None),
        };
        let (rest, query_o) = match rest.split_once('?') {
            Some((rest, query)) => {
                if query.is_empty() {
                    return Err(Error::MalformedDIDURL("empty query".into()));
                }
                (rest, Some(query.to_string()))
            }
            None => (rest, None),
        };
        let (rest, path_o) = match rest.split_once('/') {
            Some((rest, path)) => {
                if path.is_empty() {
                    return Err(Error::MalformedDIDURL("empty path".into()));
                }
                (rest, Some(path.to_string()))
            }
            None => (rest, None),
        };
        let did_o = if rest.is_empty() {
            None
        } else {
            Some(DID::from_str(rest)?)
        };
        if did_o.is_none() && path_o.is_none() && query_o.is_none() && fragment_o.is_none() {
            return Err(Error::MalformedDIDURL("no components".into()));
        }
        Ok(Self {
            did_o,
            path_o,
            query_o,
            fragment_o,
        })
    }
}

impl PartialOrd for DIDURL {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DIDURL {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.to_string();
        let rhs = other.to_string();
        lhs.to_ascii_lowercase()
            .cmp(&rhs.to_ascii_lowercase())
            .then_with(|| lhs.cmp(&rhs))
    }
}

impl serde::Serialize for DIDURL {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for DIDURL {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
