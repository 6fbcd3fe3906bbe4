use std::collections::BTreeMap;

use crate::{
    canonical, crypto, entry_map::DIDEntry, public_key::DEFAULT_PUBLIC_KEY_TYPE,
    CredentialMetadata, Error, Resolver, DID, DIDURL,
};

/// The claims a credential makes about its subject.  Claims are kept sorted
/// by property name so the canonical form is deterministic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialSubject {
    id: DID,
    claims: BTreeMap<String, serde_json::Value>,
}

impl CredentialSubject {
    pub fn new(id: DID, claims: BTreeMap<String, serde_json::Value>) -> Self {
        Self { id, claims }
    }
    pub fn id(&self) -> &DID {
        &self.id
    }
    pub fn claims(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.claims
    }
}

/// The issuer's proof over a credential's canonical bytes (proof excluded).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialProof {
    proof_type: String,
    verification_method: DIDURL,
    signature: String,
}

impl CredentialProof {
    pub fn proof_type(&self) -> &str {
        &self.proof_type
    }
    pub fn verification_method(&self) -> &DIDURL {
        &self.verification_method
    }
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// A verifiable credential: the structurally simpler analog of the DID
/// document.  Issuer-side builder conveniences, presentations, and JWT forms
/// are out of scope; this type covers what documents embed and what the
/// resolution protocol declares and revokes.
#[derive(Clone, Debug)]
pub struct VerifiableCredential {
    id: DIDURL,
    types: Vec<String>,
    issuer: DID,
    issuance_date: time::OffsetDateTime,
    expiration_date_o: Option<time::OffsetDateTime>,
    subject: CredentialSubject,
    proof_o: Option<CredentialProof>,
    metadata: CredentialMetadata,
}

impl VerifiableCredential {
    pub fn new(
        id: DIDURL,
        types: Vec<String>,
        issuer: DID,
        issuance_date: time::OffsetDateTime,
        expiration_date_o: Option<time::OffsetDateTime>,
        subject: CredentialSubject,
    ) -> Result<Self, Error> {
        let mut credential = Self {
            id,
            types,
            issuer,
            issuance_date: canonical::truncated_to_seconds(issuance_date),
            expiration_date_o: expiration_date_o.map(canonical::truncated_to_seconds),
            subject,
            proof_o: None,
            metadata: CredentialMetadata::default(),
        };
        credential.sanitize()?;
        Ok(credential)
    }

    pub fn id(&self) -> &DIDURL {
        &self.id
    }
    pub fn types(&self) -> &[String] {
        &self.types
    }
    pub fn issuer(&self) -> &DID {
        &self.issuer
    }
    pub fn issuance_date(&self) -> time::OffsetDateTime {
        self.issuance_date
    }
    pub fn expiration_date_o(&self) -> Option<time::OffsetDateTime> {
        self.expiration_date_o
    }
    pub fn subject(&self) -> &CredentialSubject {
        &self.subject
    }
    pub fn proof_o(&self) -> Option<&CredentialProof> {
        self.proof_o.as_ref()
    }
    pub fn metadata(&self) -> &CredentialMetadata {
        &self.metadata
    }
    pub(crate) fn set_metadata(&mut self, metadata: CredentialMetadata) {
        self.metadata = metadata;
    }
    /// True if the credential is issued by its own subject.
    pub fn is_self_proclaimed(&self) -> bool {
        self.issuer == *self.subject.id()
    }
    pub fn is_expired(&self) -> bool {
        match self.expiration_date_o {
            Some(expiration_date) => canonical::now_utc_seconds() > expiration_date,
            None => false,
        }
    }

    /// Normalize the credential in place: qualify the id against the subject
    /// DID, sort and dedupe types, and check the pieces a well-formed
    /// credential must have.  Idempotent once it succeeds.
    pub fn sanitize(&mut self) -> Result<(), Error> {
        let owner = self.subject.id.clone();
        self.id.qualify_with(&owner);
        if self.id.did()? != &owner {
            return Err(Error::MalformedCredential(
                "credential id does not match credential subject".into(),
            ));
        }
        if self.id.fragment_o().is_none() {
            return Err(Error::MalformedCredential(
                "credential id missing fragment".into(),
            ));
        }
        if self.types.is_empty() {
            return Err(Error::MalformedCredential("missing credential type".into()));
        }
        self.types.sort();
        self.types.dedup();
        Ok(())
    }

    /// The canonical JSON of this credential.  The normalized form is the
    /// signing/wire form; the compact form renders same-subject ids as
    /// `#fragment`.
    pub fn to_json(&self, normalized: bool) -> Result<String, Error> {
        let view = self.to_view(self.subject.id(), normalized, false);
        serde_json::to_string(&view).map_err(|_| {
            Error::MalformedCredential("failed to serialize credential to canonical JSON".into())
        })
    }

    /// The SHA-256 digest of the canonical bytes with the proof excluded;
    /// this is what the issuer signs.
    pub fn signing_digest(&self) -> Result<[u8; 32], Error> {
        let view = self.to_view(self.subject.id(), true, true);
        let bytes = serde_json::to_vec(&view).map_err(|_| {
            Error::MalformedCredential("failed to serialize credential to canonical JSON".into())
        })?;
        Ok(crypto::sha256_digest(&[&bytes]))
    }

    /// Attach the issuer's proof.  `sign_key` must be an authentication key
    /// of the issuer document and `signer` must hold its private half.
    pub fn seal(
        &mut self,
        issuer_doc: &crate::DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<(), Error> {
        if self.proof_o.is_some() {
            return Err(Error::AlreadySigned("credential already sealed".into()));
        }
        if issuer_doc.subject() != &self.issuer {
            return Err(Error::IllegalArgument(
                "issuer document does not match credential issuer".into(),
            ));
        }
        let sign_key = sign_key.qualified_with(&self.issuer);
        let key = issuer_doc
            .authentication_key(&sign_key)?
            .ok_or(Error::InvalidKey("not an authentication key".into()))?;
        if key.public_key_bytes()? != signer.verifying_key_bytes() {
            return Err(Error::InvalidKey(
                "signer does not hold the given authentication key".into(),
            ));
        }
        let digest = self.signing_digest()?;
        let signature = signer.sign_digest(&digest)?;
        self.proof_o = Some(CredentialProof {
            proof_type: DEFAULT_PUBLIC_KEY_TYPE.to_string(),
            verification_method: sign_key,
            signature: crypto::base64_url_encode(&signature),
        });
        Ok(())
    }

    /// Whether the issuer's proof verifies.  `Ok(false)` for a missing or
    /// mismatching signature; `Err` when the issuer cannot be resolved (a
    /// resolution failure is not a verdict).
    pub fn is_genuine(&self, resolver: &dyn Resolver) -> Result<bool, Error> {
        let proof = match &self.proof_o {
            Some(proof) => proof,
            None => return Ok(false),
        };
        let issuer_doc = resolver
            .resolve_did(&self.issuer, false)?
            .ok_or(Error::DIDResolve("credential issuer not found".into()))?;
        if !issuer_doc.is_genuine()? {
            return Ok(false);
        }
        let key = match issuer_doc.authentication_key(&proof.verification_method)? {
            Some(key) => key,
            None => return Ok(false),
        };
        let digest = self.signing_digest()?;
        crypto::verify_signature(
            &key.public_key_bytes()?,
            &digest,
            &crypto::base64_url_decode(&proof.signature)?,
        )
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        let raw: CredentialRaw = serde_json::from_str(s)
            .map_err(|_| Error::MalformedCredential("invalid credential JSON".into()))?;
        raw.into_credential(None)
    }

    pub(crate) fn to_view(
        &self,
        ref_did: &DID,
        normalized: bool,
        for_sign: bool,
    ) -> CredentialView {
        CredentialView {
            id: if normalized {
                self.id.to_string()
            } else {
                self.id.to_compact_string(ref_did)
            },
            r#type: self.types.clone(),
            issuer: if normalized || self.issuer != *self.subject.id() {
                Some(self.issuer.to_string())
            } else {
                None
            },
            issuance_date: canonical::format_datetime(self.issuance_date),
            expiration_date: self.expiration_date_o.map(canonical::format_datetime),
            credential_subject: CredentialSubjectView {
                id: self.subject.id.to_string(),
                claims: self.subject.claims.clone(),
            },
            proof: if for_sign {
                None
            } else {
                self.proof_o.as_ref().map(|proof| CredentialProofView {
                    r#type: if normalized || proof.proof_type != DEFAULT_PUBLIC_KEY_TYPE {
                        Some(proof.proof_type.clone())
                    } else {
                        None
                    },
                    verification_method: if normalized {
                        proof.verification_method.to_string()
                    } else {
                        proof.verification_method.to_compact_string(&self.issuer)
                    },
                    signature: proof.signature.clone(),
                })
            },
        }
    }
}

impl PartialEq for VerifiableCredential {
    fn eq(&self, other: &Self) -> bool {
        // Metadata is chain-derived, not part of the credential's identity.
        self.id == other.id
            && self.types == other.types
            && self.issuer == other.issuer
            && self.issuance_date == other.issuance_date
            && self.expiration_date_o == other.expiration_date_o
            && self.subject == other.subject
            && self.proof_o == other.proof_o
    }
}

impl Eq for VerifiableCredential {}

impl DIDEntry for VerifiableCredential {
    fn id(&self) -> &DIDURL {
        &self.id
    }
    fn entry_type(&self) -> Option<&str> {
        self.types.first().map(|s| s.as_str())
    }
}

/// Canonical serialization view: id, type, issuer, issuanceDate,
/// expirationDate, credentialSubject, proof.
#[serde_with::skip_serializing_none]
#[derive(serde::Serialize)]
pub(crate) struct CredentialView {
    pub id: String,
    pub r#type: Vec<String>,
    pub issuer: Option<String>,
    #[serde(rename = "issuanceDate")]
    pub issuance_date: String,
    #[serde(rename = "expirationDate")]
    pub expiration_date: Option<String>,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: CredentialSubjectView,
    pub proof: Option<CredentialProofView>,
}

#[derive(serde::Serialize)]
pub(crate) struct CredentialSubjectView {
    pub id: String,
    #[serde(flatten)]
    pub claims: BTreeMap<String, serde_json::Value>,
}

#[serde_with::skip_serializing_none]
#[derive(serde::Serialize)]
pub(crate) struct CredentialProofView {
    pub r#type: Option<String>,
    #[serde(rename = "verificationMethod")]
    pub verification_method: String,
    pub signature: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct CredentialRaw {
    pub id: DIDURL,
    pub r#type: canonical::OneOrManyRaw<String>,
    #[serde(default)]
    pub issuer: Option<DID>,
    #[serde(rename = "issuanceDate")]
    pub issuance_date: String,
    #[serde(rename = "expirationDate", default)]
    pub expiration_date: Option<String>,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: CredentialSubjectRaw,
    #[serde(default)]
    pub proof: Option<CredentialProofRaw>,
}

#[derive(serde::Deserialize)]
pub(crate) struct CredentialSubjectRaw {
    #[serde(default)]
    pub id: Option<DID>,
    #[serde(flatten)]
    pub claims: BTreeMap<String, serde_json::Value>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CredentialProofRaw {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(rename = "verificationMethod")]
    pub verification_method: DIDURL,
    pub signature: String,
}

impl CredentialRaw {
    /// `owner_o` is the containing document's subject when the credential is
    /// embedded; a standalone credential derives its owner from its own id.
    pub fn into_credential(self, owner_o: Option<&DID>) -> Result<VerifiableCredential, Error> {
        let owner = match (owner_o, self.credential_subject.id.as_ref(), self.id.did_o()) {
            (Some(owner), _, _) => owner.clone(),
            (None, Some(subject_id), _) => subject_id.clone(),
            (None, None, Some(id_did)) => id_did.clone(),
            (None, None, None) => {
                return Err(Error::MalformedCredential(
                    "cannot determine credential owner".into(),
                ))
            }
        };
        let issuer = self.issuer.unwrap_or_else(|| owner.clone());
        let issuance_date = canonical::parse_datetime(&self.issuance_date)
            .map_err(|_| Error::MalformedCredential("invalid issuanceDate".into()))?;
        let expiration_date_o = match self.expiration_date {
            Some(s) => Some(
                canonical::parse_datetime(&s)
                    .map_err(|_| Error::MalformedCredential("invalid expirationDate".into()))?,
            ),
            None => None,
        };
        let subject_id = self.credential_subject.id.unwrap_or_else(|| owner.clone());
        let mut credential = VerifiableCredential {
            id: self.id.qualified_with(&owner),
            types: self.r#type.into_vec(),
            issuer: issuer.clone(),
            issuance_date,
            expiration_date_o,
            subject: CredentialSubject {
                id: subject_id,
                claims: self.credential_subject.claims,
            },
            proof_o: self.proof.map(|proof| CredentialProof {
                proof_type: proof
                    .r#type
                    .unwrap_or_else(|| DEFAULT_PUBLIC_KEY_TYPE.to_string()),
                verification_method: proof.verification_method.qualified_with(&issuer),
                signature: proof.signature,
            }),
            metadata: CredentialMetadata::default(),
        };
        credential.sanitize()?;
        Ok(credential)
    }
}
