use crate::{canonical, public_key::DEFAULT_PUBLIC_KEY_TYPE, Error, DID, DIDURL};

/// A proof sealing a DID document: the signing key, the signing time, and the
/// signature over the canonical document bytes with all proofs removed.
///
/// A document carries at most one proof per signer DID; proofs are kept
/// sorted by created-date descending, tie-broken by creator DID ascending.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DocumentProof {
    proof_type: String,
    created: time::OffsetDateTime,
    creator: DIDURL,
    signature: String,
}

impl DocumentProof {
    pub fn new(
        proof_type: String,
        created: time::OffsetDateTime,
        creator: DIDURL,
        signature: String,
    ) -> Self {
        Self {
            proof_type,
            created: canonical::truncated_to_seconds(created),
            creator,
            signature,
        }
    }
    pub fn proof_type(&self) -> &str {
        &self.proof_type
    }
    pub fn created(&self) -> time::OffsetDateTime {
        self.created
    }
    /// The id of the key that created this proof.
    pub fn creator(&self) -> &DIDURL {
        &self.creator
    }
    /// The DID of the signer, i.e. the DID part of the creator key id.
    pub fn signer(&self) -> Result<&DID, Error> {
        self.creator.did()
    }
    /// The base64url-encoded signature value.
    pub fn signature(&self) -> &str {
        &self.signature
    }
    pub fn signature_bytes(&self) -> Result<Vec<u8>, Error> {
        crate::crypto::base64_url_decode(&self.signature)
    }
}

/// The canonical proof ordering: created descending, creator ascending.
pub(crate) fn proof_ordering(lhs: &DocumentProof, rhs: &DocumentProof) -> std::cmp::Ordering {
    rhs.created
        .cmp(&lhs.created)
        .then_with(|| lhs.creator.cmp(&rhs.creator))
}

/// Canonical serialization view: type, created, creator, signatureValue.
#[serde_with::skip_serializing_none]
#[derive(serde::Serialize)]
pub(crate) struct DocumentProofView {
    pub r#type: Option<String>,
    pub created: String,
    pub creator: Option<String>,
    #[serde(rename = "signatureValue")]
    pub signature_value: String,
}

impl DocumentProof {
    /// `default_key_o` is the document's default key id, used by the compact
    /// mode to elide the creator when it is that key.
    pub(crate) fn to_view(
        &self,
        subject: &DID,
        default_key_o: Option<&DIDURL>,
        normalized: bool,
    ) -> DocumentProofView {
        let type_o = if normalized || self.proof_type != DEFAULT_PUBLIC_KEY_TYPE {
            Some(self.proof_type.clone())
        } else {
            None
        };
        let creator_o = if !normalized && Some(&self.creator) == default_key_o {
            None
        } else if normalized {
            Some(self.creator.to_string())
        } else {
            Some(self.creator.to_compact_string(subject))
        };
        DocumentProofView {
            r#type: type_o,
            created: canonical::format_datetime(self.created),
            creator: creator_o,
            signature_value: self.signature.clone(),
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DocumentProofRaw {
    #[serde(default)]
    pub r#type: Option<String>,
    pub created: String,
    #[serde(default)]
    pub creator: Option<DIDURL>,
    #[serde(rename = "signatureValue")]
    pub signature_value: String,
}

/// A parsed proof whose creator may still be absent.  Proof sanitization in
/// the document decides the default creator (the subject's default key, or
/// the sole controller's) because that decision needs document context; only
/// then does this become a [DocumentProof].
pub(crate) struct PendingProof {
    pub proof_type: String,
    pub created: time::OffsetDateTime,
    pub creator_o: Option<DIDURL>,
    pub signature: String,
}

impl PendingProof {
    pub fn into_proof(self, creator: DIDURL) -> DocumentProof {
        DocumentProof {
            proof_type: self.proof_type,
            created: self.created,
            creator,
            signature: self.signature,
        }
    }
}

impl DocumentProofRaw {
    pub fn into_pending(self) -> Result<PendingProof, Error> {
        let created = canonical::parse_datetime(&self.created)
            .map_err(|_| Error::MalformedDocument("invalid proof created datetime".into()))?;
        Ok(PendingProof {
            proof_type: self
                .r#type
                .unwrap_or_else(|| DEFAULT_PUBLIC_KEY_TYPE.to_string()),
            created,
            creator_o: self.creator,
            signature: self.signature_value,
        })
    }
}
