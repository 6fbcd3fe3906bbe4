use std::collections::HashMap;

use crate::{
    canonical, crypto,
    entry_map::EntryMap,
    public_key::DEFAULT_PUBLIC_KEY_TYPE,
    DIDDocument, DIDMetadata, DocumentProof, Error, MultiSignature, PublicKey, Resolver, Service,
    VerifiableCredential, DID, DIDURL,
};

/// Documents are valid for this long unless the builder is told otherwise,
/// and never longer.
pub const MAX_VALIDITY_YEARS: i32 = 5;

/// The fragment of the default key a primitive document is born with.
const DEFAULT_KEY_FRAGMENT: &str = "primary";

/// Mutates a draft DID document and produces an immutable, proof-sealed
/// document.
///
/// [DIDDocumentBuilder::seal] consumes the builder by value, so there is no
/// reachable "used-up" builder state; re-editing a sealed document goes
/// through [DIDDocument::edit] / [DIDDocument::edit_as], which copy it into a
/// fresh builder.  Every structural mutation clears any existing proofs — a
/// document carrying stale proofs over changed content must never validate.
pub struct DIDDocumentBuilder<'r> {
    document: DIDDocument,
    /// The controller this builder acts for when editing a customized
    /// document.
    controller_o: Option<DID>,
    resolver: &'r dyn Resolver,
}

impl<'r> DIDDocumentBuilder<'r> {
    /// Start a primitive DID document: the subject is derived from the given
    /// verifying key, which becomes the document's default key.
    pub fn new_primitive(
        verifying_key_bytes: &[u8],
        resolver: &'r dyn Resolver,
    ) -> Result<Self, Error> {
        let subject = DID::from_key(verifying_key_bytes);
        let default_key_id = DIDURL::with_fragment(subject.clone(), DEFAULT_KEY_FRAGMENT)?;
        let mut public_key_map = EntryMap::new();
        let mut default_key = PublicKey::new(
            default_key_id.clone(),
            DEFAULT_PUBLIC_KEY_TYPE.to_string(),
            subject.clone(),
            crypto::base58_encode(verifying_key_bytes),
        )?;
        default_key.set_authentication_key(true);
        public_key_map.append(default_key)?;
        Ok(Self {
            document: DIDDocument {
                subject,
                controller_v: Vec::new(),
                controller_doc_m: HashMap::new(),
                effective_controller_o: None,
                multisig_o: None,
                public_key_map,
                default_public_key_o: Some(default_key_id),
                credential_map: EntryMap::new(),
                service_map: EntryMap::new(),
                expires: default_expires(),
                proof_v: Vec::new(),
                metadata: DIDMetadata::default(),
            },
            controller_o: None,
            resolver,
        })
    }

    /// Start a customized DID document governed by the given controllers.
    /// With more than one controller, `multisig_m` selects the required
    /// signature count m (n is always the controller count).
    pub fn new_customized(
        subject: DID,
        controller_v: Vec<DID>,
        multisig_m_o: Option<usize>,
        resolver: &'r dyn Resolver,
    ) -> Result<Self, Error> {
        if controller_v.is_empty() {
            return Err(Error::IllegalArgument(
                "customized DID needs at least one controller".into(),
            ));
        }
        let multisig_o = match (controller_v.len(), multisig_m_o) {
            (1, None) | (1, Some(1)) => None,
            (1, Some(_)) => {
                return Err(Error::IllegalArgument(
                    "invalid multisig spec for a single controller".into(),
                ))
            }
            (n, Some(m)) => Some(MultiSignature::new(m, n)?),
            (_, None) => {
                return Err(Error::IllegalArgument(
                    "multisig spec required for multiple controllers".into(),
                ))
            }
        };
        let mut builder = Self {
            document: DIDDocument {
                subject,
                controller_v,
                controller_doc_m: HashMap::new(),
                effective_controller_o: None,
                multisig_o,
                public_key_map: EntryMap::new(),
                default_public_key_o: None,
                credential_map: EntryMap::new(),
                service_map: EntryMap::new(),
                expires: default_expires(),
                proof_v: Vec::new(),
                metadata: DIDMetadata::default(),
            },
            controller_o: None,
            resolver,
        };
        // Resolves and validates the controllers up front so precondition
        // failures surface here rather than at seal time.
        builder.document.sanitize(resolver)?;
        Ok(builder)
    }

    /// Select which controller this builder acts (and seals) for.  Required
    /// before sealing a freshly-created multi-controller draft; a
    /// single-controller draft defaults to its sole controller.
    pub fn as_controller(&mut self, controller: DID) -> Result<&mut Self, Error> {
        if !self.document.is_customized() {
            return Err(Error::NotCustomizedDID(
                self.document.subject.to_string().into(),
            ));
        }
        if !self.document.has_controller(&controller) {
            return Err(Error::NotController(controller.to_string().into()));
        }
        self.controller_o = Some(controller);
        Ok(self)
    }

    pub(crate) fn from_document(
        document: DIDDocument,
        controller_o: Option<DID>,
        resolver: &'r dyn Resolver,
    ) -> Self {
        Self {
            document,
            controller_o,
            resolver,
        }
    }

    /// The draft's subject DID.
    pub fn subject(&self) -> &DID {
        &self.document.subject
    }

    fn invalidate_proofs(&mut self) {
        self.document.proof_v.clear();
    }

    fn canonical_id(&self, id: &DIDURL) -> Result<DIDURL, Error> {
        let id = id.qualified_with(&self.document.subject);
        if id.did()? != &self.document.subject {
            return Err(Error::IllegalArgument(
                format!("id does not belong to the subject: {}", id).into(),
            ));
        }
        Ok(id)
    }

    /// Declare a public key.  `controller_o` defaults to the subject.
    pub fn append_public_key(
        &mut self,
        id: &DIDURL,
        controller_o: Option<DID>,
        public_key_base58: String,
    ) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        let controller = controller_o.unwrap_or_else(|| self.document.subject.clone());
        let pk = PublicKey::new(
            id,
            DEFAULT_PUBLIC_KEY_TYPE.to_string(),
            controller,
            public_key_base58,
        )?;
        self.document.public_key_map.append(pk)?;
        self.invalidate_proofs();
        Ok(self)
    }

    /// Remove a public key.  The default key cannot be removed.
    pub fn remove_public_key(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        if self.document.default_public_key_o.as_ref() == Some(&id) {
            return Err(Error::InvalidKey("cannot remove the default key".into()));
        }
        if self.document.public_key_map.remove(&id).is_none() {
            return Err(Error::NotFound(format!("public key: {}", id).into()));
        }
        self.invalidate_proofs();
        Ok(self)
    }

    /// Mark an already-declared key as an authentication key.  The key's
    /// controller must be the subject.
    pub fn append_authentication_key(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        let subject = self.document.subject.clone();
        let pk = self
            .document
            .public_key_map
            .get_mut(&id)
            .ok_or(Error::NotFound(format!("public key: {}", id).into()))?;
        if pk.controller() != &subject {
            return Err(Error::InvalidKey(
                "authentication key controller must be the subject".into(),
            ));
        }
        pk.set_authentication_key(true);
        self.invalidate_proofs();
        Ok(self)
    }

    /// Declare a new key owned by the subject and mark it for authentication.
    pub fn append_authentication_key_with(
        &mut self,
        id: &DIDURL,
        public_key_base58: String,
    ) -> Result<&mut Self, Error> {
        self.append_public_key(id, None, public_key_base58)?;
        self.append_authentication_key(id)
    }

    pub fn remove_authentication_key(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        if self.document.default_public_key_o.as_ref() == Some(&id) {
            return Err(Error::InvalidKey(
                "cannot remove authentication role from the default key".into(),
            ));
        }
        let pk = self
            .document
            .public_key_map
            .get_mut(&id)
            .ok_or(Error::NotFound(format!("public key: {}", id).into()))?;
        if !pk.is_authentication_key() {
            return Err(Error::InvalidKey("not an authentication key".into()));
        }
        pk.set_authentication_key(false);
        self.invalidate_proofs();
        Ok(self)
    }

    /// Mark an already-declared key as an authorization key.  The key's
    /// controller must differ from the subject.
    pub fn append_authorization_key(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        let subject = self.document.subject.clone();
        let pk = self
            .document
            .public_key_map
            .get_mut(&id)
            .ok_or(Error::NotFound(format!("public key: {}", id).into()))?;
        if pk.controller() == &subject {
            return Err(Error::InvalidKey(
                "authorization key controller must differ from the subject".into(),
            ));
        }
        pk.set_authorization_key(true);
        self.invalidate_proofs();
        Ok(self)
    }

    /// Declare a key controlled by another DID and mark it for authorization.
    pub fn append_authorization_key_with(
        &mut self,
        id: &DIDURL,
        controller: DID,
        public_key_base58: String,
    ) -> Result<&mut Self, Error> {
        if controller == self.document.subject {
            return Err(Error::InvalidKey(
                "authorization key controller must differ from the subject".into(),
            ));
        }
        self.append_public_key(id, Some(controller), public_key_base58)?;
        self.append_authorization_key(id)
    }

    pub fn remove_authorization_key(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        let pk = self
            .document
            .public_key_map
            .get_mut(&id)
            .ok_or(Error::NotFound(format!("public key: {}", id).into()))?;
        if !pk.is_authorization_key() {
            return Err(Error::InvalidKey("not an authorization key".into()));
        }
        pk.set_authorization_key(false);
        self.invalidate_proofs();
        Ok(self)
    }

    pub fn append_credential(&mut self, credential: VerifiableCredential) -> Result<&mut Self, Error> {
        if credential.id().did()? != &self.document.subject {
            return Err(Error::IllegalArgument(
                format!("credential does not belong to the subject: {}", credential.id()).into(),
            ));
        }
        self.document.credential_map.append(credential)?;
        self.invalidate_proofs();
        Ok(self)
    }

    pub fn remove_credential(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        if self.document.credential_map.remove(&id).is_none() {
            return Err(Error::NotFound(format!("credential: {}", id).into()));
        }
        self.invalidate_proofs();
        Ok(self)
    }

    pub fn append_service(
        &mut self,
        id: &DIDURL,
        service_type: String,
        endpoint: String,
    ) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        self.document
            .service_map
            .append(Service::new(id, service_type, endpoint)?)?;
        self.invalidate_proofs();
        Ok(self)
    }

    pub fn remove_service(&mut self, id: &DIDURL) -> Result<&mut Self, Error> {
        let id = self.canonical_id(id)?;
        if self.document.service_map.remove(&id).is_none() {
            return Err(Error::NotFound(format!("service: {}", id).into()));
        }
        self.invalidate_proofs();
        Ok(self)
    }

    /// Set the expiry.  Must lie in the future and within the maximum
    /// validity window.
    pub fn set_expires(&mut self, expires: time::OffsetDateTime) -> Result<&mut Self, Error> {
        let expires = canonical::truncated_to_seconds(expires);
        let now = canonical::now_utc_seconds();
        if expires <= now {
            return Err(Error::InvalidExpires("expires must be in the future".into()));
        }
        if expires > max_expires() {
            return Err(Error::InvalidExpires(
                "expires exceeds the maximum validity window".into(),
            ));
        }
        self.document.expires = expires;
        self.invalidate_proofs();
        Ok(self)
    }

    /// Reset the expiry to the default validity window.
    pub fn set_default_expires(&mut self) -> &mut Self {
        self.document.expires = default_expires();
        self.invalidate_proofs();
        self
    }

    /// Add a controller to a customized draft.  The controller document must
    /// resolve, be valid, and be primitive (no nested customization).
    /// Invalidates the multisig spec, which must be re-set afterwards.
    pub fn append_controller(&mut self, controller: DID) -> Result<&mut Self, Error> {
        if !self.document.is_customized() {
            return Err(Error::NotCustomizedDID(
                self.document.subject.to_string().into(),
            ));
        }
        if controller == self.document.subject {
            return Err(Error::IllegalArgument(
                "document cannot be its own controller".into(),
            ));
        }
        if self.document.has_controller(&controller) {
            return Err(Error::AlreadyExists(
                format!("controller: {}", controller).into(),
            ));
        }
        let controller_doc = self
            .resolver
            .resolve_did(&controller, false)?
            .ok_or_else(|| Error::NotFound(format!("controller: {}", controller).into()))?;
        if controller_doc.is_deactivated() {
            return Err(Error::DIDDeactivated(controller.to_string().into()));
        }
        if controller_doc.is_expired() {
            return Err(Error::DIDExpired(controller.to_string().into()));
        }
        if controller_doc.is_customized() {
            return Err(Error::IllegalArgument(
                "controller must be a primitive DID".into(),
            ));
        }
        if !controller_doc.is_genuine()? {
            return Err(Error::DIDNotGenuine(controller.to_string().into()));
        }
        self.document.controller_v.push(controller.clone());
        self.document.controller_v.sort();
        self.document.controller_doc_m.insert(controller, controller_doc);
        self.document.multisig_o = None;
        self.invalidate_proofs();
        Ok(self)
    }

    /// Remove a controller.  Forbidden for the currently effective
    /// controller.  Invalidates the multisig spec and proofs.
    pub fn remove_controller(&mut self, controller: &DID) -> Result<&mut Self, Error> {
        if !self.document.is_customized() {
            return Err(Error::NotCustomizedDID(
                self.document.subject.to_string().into(),
            ));
        }
        let effective_o = self
            .controller_o
            .as_ref()
            .or(self.document.effective_controller_o.as_ref());
        if effective_o == Some(controller) {
            return Err(Error::IllegalArgument(
                "cannot remove the effective controller".into(),
            ));
        }
        let index = self
            .document
            .controller_v
            .iter()
            .position(|c| c == controller)
            .ok_or_else(|| Error::NotFound(format!("controller: {}", controller).into()))?;
        self.document.controller_v.remove(index);
        self.document.controller_doc_m.remove(controller);
        self.document.multisig_o = None;
        self.invalidate_proofs();
        Ok(self)
    }

    /// Set the required signature count m; n is always the current controller
    /// count.  A no-op when unchanged, otherwise invalidates proofs.
    pub fn set_multi_signature(&mut self, m: usize) -> Result<&mut Self, Error> {
        if !self.document.is_customized() {
            return Err(Error::NotCustomizedDID(
                self.document.subject.to_string().into(),
            ));
        }
        let n = self.document.controller_v.len();
        let multisig_o = if n == 1 {
            if m != 1 {
                return Err(Error::IllegalArgument(
                    "invalid multisig spec for a single controller".into(),
                ));
            }
            None
        } else {
            Some(MultiSignature::new(m, n)?)
        };
        if self.document.multisig_o == multisig_o {
            return Ok(self);
        }
        self.document.multisig_o = multisig_o;
        self.invalidate_proofs();
        Ok(self)
    }

    /// Sanitize the draft, sign it with the determined signer's default key,
    /// and return the now-immutable document.  Consumes the builder.
    ///
    /// For a primitive draft the signer is the document itself; for a
    /// customized draft it is the acting controller (the one `edit_as` was
    /// called with, or the sole controller).  A multi-controller document is
    /// sealed once per controller, via repeated edit/seal cycles, until it is
    /// qualified.
    pub fn seal(mut self, signer: &dyn crypto::Signer) -> Result<DIDDocument, Error> {
        self.document.sanitize(self.resolver)?;
        let (signer_did, signer_key) = if self.document.is_customized() {
            let controller = self
                .controller_o
                .clone()
                .or_else(|| self.document.effective_controller_o.clone())
                .ok_or(Error::NoEffectiveController(
                    self.document.subject.to_string().into(),
                ))?;
            let controller_doc = self
                .document
                .controller_doc_m
                .get(&controller)
                .ok_or(Error::NotController(controller.to_string().into()))?;
            let key = controller_doc
                .default_public_key_o()
                .ok_or(Error::MalformedDocument(
                    "controller document missing default public key".into(),
                ))?;
            (controller, key.clone())
        } else {
            let key = self
                .document
                .default_public_key_o()
                .ok_or(Error::MalformedDocument("missing default public key".into()))?;
            (self.document.subject.clone(), key.clone())
        };
        if self.document.proof_of(&signer_did).is_some() {
            return Err(Error::AlreadySigned(signer_did.to_string().into()));
        }
        if signer_key.public_key_bytes()? != signer.verifying_key_bytes() {
            return Err(Error::InvalidKey(
                "signer does not hold the signing key".into(),
            ));
        }
        let digest = self.document.signing_digest()?;
        let signature = signer.sign_digest(&digest)?;
        self.document.add_proof(DocumentProof::new(
            signer_key.key_type().to_string(),
            canonical::now_utc_seconds(),
            signer_key.id().clone(),
            crypto::base64_url_encode(&signature),
        ))?;
        Ok(self.document)
    }
}

fn default_expires() -> time::OffsetDateTime {
    max_expires()
}

fn max_expires() -> time::OffsetDateTime {
    let now = canonical::now_utc_seconds();
    let target_year = now.year() + MAX_VALIDITY_YEARS;
    now.replace_year(target_year).unwrap_or_else(|_| {
        // Feb 29 with a non-leap target year; clamp to Feb 28.
        now.replace_day(28)
            .expect("programmer error: day 28 exists in every month")
            .replace_year(target_year)
            .expect("programmer error: non-leap-day date accepts any year")
    })
}
