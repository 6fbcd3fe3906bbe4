use crate::{entry_map::DIDEntry, Error, DID, DIDURL};

/// The key type every key in this system carries unless a document says
/// otherwise.  Omitted in the compact serialization when it is this value.
pub const DEFAULT_PUBLIC_KEY_TYPE: &str = "Ed25519VerificationKey2020";

/// A public key entry of a DID document.
///
/// The authentication/authorization roles are boolean markers on the key, not
/// separate collections; the canonical serialization renders the roles as
/// reference arrays.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey {
    id: DIDURL,
    key_type: String,
    controller: DID,
    public_key_base58: String,
    authentication_key: bool,
    authorization_key: bool,
}

impl PublicKey {
    pub fn new(
        id: DIDURL,
        key_type: String,
        controller: DID,
        public_key_base58: String,
    ) -> Result<Self, Error> {
        if public_key_base58.is_empty() {
            return Err(Error::InvalidKey("empty public key base58 value".into()));
        }
        Ok(Self {
            id,
            key_type,
            controller,
            public_key_base58,
            authentication_key: false,
            authorization_key: false,
        })
    }
    pub fn id(&self) -> &DIDURL {
        &self.id
    }
    pub fn key_type(&self) -> &str {
        &self.key_type
    }
    pub fn controller(&self) -> &DID {
        &self.controller
    }
    pub fn public_key_base58(&self) -> &str {
        &self.public_key_base58
    }
    /// The raw verifying key bytes decoded from the base58 value.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, Error> {
        crate::crypto::base58_decode(&self.public_key_base58)
    }
    pub fn is_authentication_key(&self) -> bool {
        self.authentication_key
    }
    pub fn is_authorization_key(&self) -> bool {
        self.authorization_key
    }
    pub(crate) fn set_authentication_key(&mut self, authentication_key: bool) {
        self.authentication_key = authentication_key;
    }
    pub(crate) fn set_authorization_key(&mut self, authorization_key: bool) {
        self.authorization_key = authorization_key;
    }
    /// True if this key's derived address matches the given subject's
    /// method-specific id, i.e. this key is the subject's default key.
    pub fn matches_address_of(&self, subject: &DID) -> Result<bool, Error> {
        let key_bytes = self.public_key_bytes()?;
        Ok(crate::crypto::address_from_key(&key_bytes) == subject.method_specific_id())
    }
}

impl DIDEntry for PublicKey {
    fn id(&self) -> &DIDURL {
        &self.id
    }
    fn entry_type(&self) -> Option<&str> {
        Some(&self.key_type)
    }
}

/// Canonical serialization view of a public key entry.  Field order is fixed:
/// id, type, controller, publicKeyBase58.
#[serde_with::skip_serializing_none]
#[derive(serde::Serialize)]
pub(crate) struct PublicKeyView {
    pub id: String,
    pub r#type: Option<String>,
    pub controller: Option<String>,
    #[serde(rename = "publicKeyBase58")]
    pub public_key_base58: String,
}

impl PublicKey {
    pub(crate) fn to_view(&self, subject: &DID, normalized: bool) -> PublicKeyView {
        let id = if normalized {
            self.id.to_string()
        } else {
            self.id.to_compact_string(subject)
        };
        let type_o = if normalized || self.key_type != DEFAULT_PUBLIC_KEY_TYPE {
            Some(self.key_type.clone())
        } else {
            None
        };
        let controller_o = if normalized || self.controller != *subject {
            Some(self.controller.to_string())
        } else {
            None
        };
        PublicKeyView {
            id,
            r#type: type_o,
            controller: controller_o,
            public_key_base58: self.public_key_base58.clone(),
        }
    }
}

/// Raw deserialization shape of a public key entry; defaults are filled in
/// and invariants enforced by document sanitization.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PublicKeyRaw {
    pub id: DIDURL,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub controller: Option<DID>,
    #[serde(rename = "publicKeyBase58")]
    pub public_key_base58: String,
}

impl PublicKeyRaw {
    pub fn into_public_key(self, subject: &DID) -> Result<PublicKey, Error> {
        PublicKey::new(
            self.id.qualified_with(subject),
            self.r#type
                .unwrap_or_else(|| DEFAULT_PUBLIC_KEY_TYPE.to_string()),
            self.controller.unwrap_or_else(|| subject.clone()),
            self.public_key_base58,
        )
    }
}

/// An entry of the authentication/authorization arrays as it appears on the
/// wire: either a bare reference to an already-declared key (a "virtual"
/// reference) or a full key block.
#[derive(serde::Deserialize)]
#[serde(untagged)]
pub(crate) enum PublicKeyReferenceRaw {
    Reference(DIDURL),
    Key(PublicKeyRaw),
}
