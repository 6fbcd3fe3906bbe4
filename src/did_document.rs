use std::collections::{HashMap, HashSet};

use crate::{
    canonical::{self, OneOrMany, OneOrManyRaw},
    crypto,
    entry_map::EntryMap,
    proof::{proof_ordering, DocumentProofRaw, DocumentProofView, PendingProof},
    public_key::{PublicKeyRaw, PublicKeyReferenceRaw, PublicKeyView},
    service::{ServiceRaw, ServiceView},
    verifiable_credential::{CredentialRaw, CredentialView},
    DIDMetadata, DIDDocumentBuilder, DocumentProof, Error, MultiSignature, PublicKey, Resolver,
    Service, VerifiableCredential, DID, DIDURL,
};

/// The data model for DID documents: the signed object describing a DID's
/// keys, controllers, services, and credentials.
///
/// A *primitive* DID document has exactly one controller-less default key
/// whose derived address equals the subject's method-specific id, and is
/// sealed by exactly one proof from that key.  A *customized* DID document
/// has one or more controllers and no default key; it is governed by the
/// controllers, with an m-of-n multisignature once there is more than one.
///
/// Note that if you want to serialize this DID document, you MUST use
/// [DIDDocument::to_json]: the canonical form is a fixed field order with
/// sorted-by-id arrays, which generic serialization does not produce, and the
/// normalized canonical bytes are what gets hashed and signed.
#[derive(Clone, Debug)]
pub struct DIDDocument {
    pub(crate) subject: DID,
    pub(crate) controller_v: Vec<DID>,
    pub(crate) controller_doc_m: HashMap<DID, DIDDocument>,
    pub(crate) effective_controller_o: Option<DID>,
    pub(crate) multisig_o: Option<MultiSignature>,
    pub(crate) public_key_map: EntryMap<PublicKey>,
    pub(crate) default_public_key_o: Option<DIDURL>,
    pub(crate) credential_map: EntryMap<VerifiableCredential>,
    pub(crate) service_map: EntryMap<Service>,
    pub(crate) expires: time::OffsetDateTime,
    pub(crate) proof_v: Vec<DocumentProof>,
    pub(crate) metadata: DIDMetadata,
}

impl DIDDocument {
    pub fn subject(&self) -> &DID {
        &self.subject
    }
    /// True if this document is governed by controllers rather than by its
    /// own default key.
    pub fn is_customized(&self) -> bool {
        !self.controller_v.is_empty()
    }
    pub fn controllers(&self) -> &[DID] {
        &self.controller_v
    }
    pub fn controller_count(&self) -> usize {
        self.controller_v.len()
    }
    pub fn has_controller(&self, did: &DID) -> bool {
        self.controller_v.contains(did)
    }
    /// The resolved document for the given controller, populated by
    /// sanitization.
    pub fn controller_document(&self, did: &DID) -> Option<&DIDDocument> {
        self.controller_doc_m.get(did)
    }
    /// The controller currently acting for this document: the sole controller
    /// of a single-controller document, or whichever controller was selected
    /// via [DIDDocument::set_effective_controller].
    pub fn effective_controller_o(&self) -> Option<&DID> {
        self.effective_controller_o.as_ref()
    }
    pub fn set_effective_controller(&mut self, controller_o: Option<DID>) -> Result<(), Error> {
        if let Some(controller) = &controller_o {
            if !self.is_customized() {
                return Err(Error::NotCustomizedDID(self.subject.to_string().into()));
            }
            if !self.has_controller(controller) {
                return Err(Error::NotController(controller.to_string().into()));
            }
        }
        self.effective_controller_o = controller_o;
        Ok(())
    }
    pub fn multisig_o(&self) -> Option<&MultiSignature> {
        self.multisig_o.as_ref()
    }

    pub fn public_key_count(&self) -> usize {
        self.public_key_map.len()
    }
    /// All public keys in canonical order.
    pub fn public_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.public_key_map.values()
    }
    pub fn public_key(&self, id: &DIDURL) -> Option<&PublicKey> {
        self.public_key_map.get(&id.qualified_with(&self.subject))
    }
    /// Lazily select public keys by optional id and/or type.
    pub fn select_public_keys<'s>(
        &'s self,
        id_o: Option<&'s DIDURL>,
        type_o: Option<&'s str>,
    ) -> impl Iterator<Item = &'s PublicKey> {
        self.public_key_map.select(id_o, type_o, |_| true)
    }
    /// The id of the default key: the key whose derived address equals the
    /// subject's method-specific id.  Present exactly for primitive DIDs.
    pub fn default_public_key_id_o(&self) -> Option<&DIDURL> {
        self.default_public_key_o.as_ref()
    }
    pub fn default_public_key_o(&self) -> Option<&PublicKey> {
        self.default_public_key_o
            .as_ref()
            .and_then(|id| self.public_key_map.get(id))
    }

    pub fn authentication_key_count(&self) -> usize {
        self.public_key_map.count(|pk| pk.is_authentication_key())
    }
    pub fn authentication_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.public_key_map.filtered(|pk| pk.is_authentication_key())
    }
    /// Look up an authentication key.  On a customized document, a key id
    /// belonging to a controller falls through to that controller's document.
    pub fn authentication_key(&self, id: &DIDURL) -> Result<Option<&PublicKey>, Error> {
        let id = id.qualified_with(&self.subject);
        if id.did()? == &self.subject {
            Ok(self
                .public_key_map
                .get(&id)
                .filter(|pk| pk.is_authentication_key()))
        } else if let Some(controller_doc) = self.controller_doc_m.get(id.did()?) {
            controller_doc.authentication_key(&id)
        } else {
            Ok(None)
        }
    }
    pub fn contains_authentication_key(&self, id: &DIDURL) -> Result<bool, Error> {
        Ok(self.authentication_key(id)?.is_some())
    }

    pub fn authorization_key_count(&self) -> usize {
        self.public_key_map.count(|pk| pk.is_authorization_key())
    }
    pub fn authorization_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.public_key_map.filtered(|pk| pk.is_authorization_key())
    }
    pub fn authorization_key(&self, id: &DIDURL) -> Option<&PublicKey> {
        self.public_key_map
            .get(&id.qualified_with(&self.subject))
            .filter(|pk| pk.is_authorization_key())
    }

    pub fn credential_count(&self) -> usize {
        self.credential_map.len()
    }
    pub fn credentials(&self) -> impl Iterator<Item = &VerifiableCredential> {
        self.credential_map.values()
    }
    pub fn credential(&self, id: &DIDURL) -> Option<&VerifiableCredential> {
        self.credential_map.get(&id.qualified_with(&self.subject))
    }
    pub fn select_credentials<'s>(
        &'s self,
        id_o: Option<&'s DIDURL>,
        type_o: Option<&'s str>,
    ) -> impl Iterator<Item = &'s VerifiableCredential> {
        self.credential_map.select(id_o, type_o, |_| true)
    }

    pub fn service_count(&self) -> usize {
        self.service_map.len()
    }
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.service_map.values()
    }
    pub fn service(&self, id: &DIDURL) -> Option<&Service> {
        self.service_map.get(&id.qualified_with(&self.subject))
    }

    pub fn expires(&self) -> time::OffsetDateTime {
        self.expires
    }

    pub fn proofs(&self) -> &[DocumentProof] {
        &self.proof_v
    }
    /// The first (canonically ordered) proof.  Errors on an unsealed draft.
    pub fn proof(&self) -> Result<&DocumentProof, Error> {
        self.proof_v
            .first()
            .ok_or(Error::MalformedDocument("document has no proof".into()))
    }
    /// The proof created by the given signer DID, if any.
    pub fn proof_of(&self, signer: &DID) -> Option<&DocumentProof> {
        self.proof_v
            .iter()
            .find(|proof| proof.signer().ok() == Some(signer))
    }

    pub fn metadata(&self) -> &DIDMetadata {
        &self.metadata
    }
    pub fn metadata_mut(&mut self) -> &mut DIDMetadata {
        &mut self.metadata
    }
    pub fn set_metadata(&mut self, metadata: DIDMetadata) {
        self.metadata = metadata;
    }

    /// The number of proofs this document needs in order to be qualified:
    /// m for a multisignature customized document, 1 otherwise.
    pub fn required_signature_count(&self) -> usize {
        match &self.multisig_o {
            Some(multisig) => multisig.m(),
            None => 1,
        }
    }
    /// True once the document carries its full required set of proofs and is
    /// therefore publishable.
    pub fn is_qualified(&self) -> bool {
        self.proof_v.len() == self.required_signature_count()
    }

    pub fn is_expired(&self) -> bool {
        canonical::now_utc_seconds() > self.expires
    }
    pub fn is_deactivated(&self) -> bool {
        self.metadata.deactivated
    }

    /// Whether every required proof verifies against the canonical digest.
    ///
    /// Returns Ok(false) for an actual mismatch (wrong count, wrong creator,
    /// bad signature); returns Err only for structural or resolution
    /// failures, which are not a verdict about genuineness.
    pub fn is_genuine(&self) -> Result<bool, Error> {
        let digest = self.signing_digest()?;
        if !self.is_customized() {
            // Primitive: signed (only) by the default public key.
            if self.proof_v.len() != 1 {
                return Ok(false);
            }
            let proof = &self.proof_v[0];
            let default_key = self.default_public_key_o().ok_or(Error::MalformedDocument(
                "primitive DID document missing default public key".into(),
            ))?;
            if proof.creator() != default_key.id() {
                return Ok(false);
            }
            if proof.proof_type() != default_key.key_type() {
                return Ok(false);
            }
            return crypto::verify_signature(
                &default_key.public_key_bytes()?,
                &digest,
                &proof.signature_bytes()?,
            );
        }
        // Customized: m proofs (1 for a sole controller), each from a
        // controller's default key, each controller document itself genuine.
        if self.proof_v.len() != self.required_signature_count() {
            return Ok(false);
        }
        let mut signer_s = HashSet::new();
        for proof in &self.proof_v {
            let signer = proof.signer()?;
            if !signer_s.insert(signer.clone()) {
                return Ok(false);
            }
            if !self.has_controller(signer) {
                return Ok(false);
            }
            let controller_doc = self.controller_doc_m.get(signer).ok_or(Error::DIDResolve(
                "controller document not resolved; sanitize the document first".into(),
            ))?;
            if !controller_doc.is_genuine()? {
                return Ok(false);
            }
            let controller_default_key =
                controller_doc
                    .default_public_key_o()
                    .ok_or(Error::MalformedDocument(
                        "controller document missing default public key".into(),
                    ))?;
            if proof.creator() != controller_default_key.id() {
                return Ok(false);
            }
            if !crypto::verify_signature(
                &controller_default_key.public_key_bytes()?,
                &digest,
                &proof.signature_bytes()?,
            )? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Genuine, not expired, not deactivated — and, for a customized
    /// document, every controller document valid in turn.
    pub fn is_valid(&self) -> Result<bool, Error> {
        if self.is_deactivated() || self.is_expired() || !self.is_genuine()? {
            return Ok(false);
        }
        for controller_doc in self.controller_doc_m.values() {
            if !controller_doc.is_valid()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Open this document for editing.  The returned builder owns a draft
    /// copy; this document is untouched.
    pub fn edit<'r>(&self, resolver: &'r dyn Resolver) -> DIDDocumentBuilder<'r> {
        DIDDocumentBuilder::from_document(self.clone(), None, resolver)
    }
    /// Open a customized document for editing on behalf of one of its
    /// controllers.
    pub fn edit_as<'r>(
        &self,
        controller_doc: &DIDDocument,
        resolver: &'r dyn Resolver,
    ) -> Result<DIDDocumentBuilder<'r>, Error> {
        if !self.is_customized() {
            return Err(Error::NotCustomizedDID(self.subject.to_string().into()));
        }
        if !self.has_controller(controller_doc.subject()) {
            return Err(Error::NotController(
                controller_doc.subject().to_string().into(),
            ));
        }
        Ok(DIDDocumentBuilder::from_document(
            self.clone(),
            Some(controller_doc.subject().clone()),
            resolver,
        ))
    }

    /// Normalize and validate the document: resolve controllers, default and
    /// validate keys, credentials, services, and proofs.  Any violation is a
    /// malformed-document error; sanitization is idempotent once it succeeds.
    pub fn sanitize(&mut self, resolver: &dyn Resolver) -> Result<(), Error> {
        self.sanitize_controllers(resolver)?;
        self.sanitize_public_keys()?;
        self.sanitize_credentials()?;
        self.sanitize_services()?;
        self.sanitize_proofs()?;
        Ok(())
    }

    fn sanitize_controllers(&mut self, resolver: &dyn Resolver) -> Result<(), Error> {
        if self.controller_v.is_empty() {
            if self.multisig_o.is_some() {
                return Err(Error::MalformedDocument("invalid multisig property".into()));
            }
            self.controller_doc_m.clear();
            return Ok(());
        }
        self.controller_v.sort();
        self.controller_v.dedup();
        if self.controller_v.contains(&self.subject) {
            return Err(Error::MalformedDocument(
                "document cannot be its own controller".into(),
            ));
        }
        let mut controller_doc_m = HashMap::with_capacity(self.controller_v.len());
        for controller in &self.controller_v {
            // A transport failure surfaces as-is; only confirmed absence is a
            // malformed document.
            let controller_doc = resolver.resolve_did(controller, false)?.ok_or_else(|| {
                Error::MalformedDocument(
                    format!("can not resolve controller: {}", controller).into(),
                )
            })?;
            if controller_doc.is_customized() {
                // Nested customization is rejected; this is what bounds
                // controller resolution recursion.
                return Err(Error::MalformedDocument(
                    format!("controller is not a primitive DID: {}", controller).into(),
                ));
            }
            controller_doc_m.insert(controller.clone(), controller_doc);
        }
        self.controller_doc_m = controller_doc_m;
        match (self.controller_v.len(), &self.multisig_o) {
            (1, Some(_)) => {
                return Err(Error::MalformedDocument("invalid multisig property".into()))
            }
            (1, None) => {
                self.effective_controller_o = Some(self.controller_v[0].clone());
            }
            (_, None) => {
                return Err(Error::MalformedDocument("missing multisig property".into()))
            }
            (n, Some(multisig)) => {
                if multisig.n() != n {
                    return Err(Error::MalformedDocument("invalid multisig property".into()));
                }
            }
        }
        let effective_still_controls = self
            .effective_controller_o
            .as_ref()
            .map(|effective| self.controller_v.contains(effective))
            .unwrap_or(true);
        if !effective_still_controls {
            self.effective_controller_o = None;
        }
        Ok(())
    }

    fn sanitize_public_keys(&mut self) -> Result<(), Error> {
        let mut base58_s = HashSet::new();
        for pk in self.public_key_map.values() {
            if pk.id().did()? != &self.subject {
                return Err(Error::MalformedDocument(
                    format!("invalid public key id: {}", pk.id()).into(),
                ));
            }
            if !base58_s.insert(pk.public_key_base58().to_string()) {
                return Err(Error::MalformedDocument(
                    "duplicate public key base58 value".into(),
                ));
            }
            if pk.is_authentication_key() && pk.controller() != &self.subject {
                return Err(Error::MalformedDocument(
                    format!("authentication key with wrong controller: {}", pk.id()).into(),
                ));
            }
            if pk.is_authorization_key() && pk.controller() == &self.subject {
                return Err(Error::MalformedDocument(
                    format!("authorization key with wrong controller: {}", pk.id()).into(),
                ));
            }
        }
        // Locate the default key: the one whose address is the subject's
        // method-specific id and whose controller is the subject.
        let mut default_public_key_o = None;
        for pk in self.public_key_map.values() {
            if pk.controller() == &self.subject && pk.matches_address_of(&self.subject)? {
                default_public_key_o = Some(pk.id().clone());
                break;
            }
        }
        if let Some(default_public_key) = &default_public_key_o {
            // The default key is always an authentication key.
            let pk = self
                .public_key_map
                .get_mut(default_public_key)
                .expect("programmer error: default key id was just found in the map");
            pk.set_authentication_key(true);
        }
        if default_public_key_o.is_none() && self.controller_v.is_empty() {
            return Err(Error::MalformedDocument("missing default public key".into()));
        }
        self.default_public_key_o = default_public_key_o;
        Ok(())
    }

    fn sanitize_credentials(&mut self) -> Result<(), Error> {
        let ids: Vec<DIDURL> = self.credential_map.values().map(|vc| vc.id().clone()).collect();
        for id in ids {
            if id.did()? != &self.subject {
                return Err(Error::MalformedDocument(
                    format!("invalid credential id: {}", id).into(),
                ));
            }
            let vc = self
                .credential_map
                .get_mut(&id)
                .expect("programmer error: id was just taken from the map");
            vc.sanitize()
                .map_err(|_| Error::MalformedDocument(format!("invalid credential: {}", id).into()))?;
        }
        Ok(())
    }

    fn sanitize_services(&mut self) -> Result<(), Error> {
        for service in self.service_map.values() {
            if service.id().did()? != &self.subject {
                return Err(Error::MalformedDocument(
                    format!("invalid service id: {}", service.id()).into(),
                ));
            }
        }
        Ok(())
    }

    fn sanitize_proofs(&mut self) -> Result<(), Error> {
        let mut signer_s = HashSet::new();
        for proof in &self.proof_v {
            let signer = proof
                .signer()
                .map_err(|_| Error::MalformedDocument("proof creator is not qualified".into()))?;
            if !signer_s.insert(signer.clone()) {
                return Err(Error::MalformedDocument(
                    format!("already exists proof from {}", signer).into(),
                ));
            }
        }
        self.proof_v.sort_by(proof_ordering);
        Ok(())
    }

    /// Attach a proof, rejecting a second proof from the same signer.
    pub(crate) fn add_proof(&mut self, proof: DocumentProof) -> Result<(), Error> {
        let signer = proof.signer()?.clone();
        if self.proof_of(&signer).is_some() {
            return Err(Error::AlreadySigned(signer.to_string().into()));
        }
        self.proof_v.push(proof);
        self.proof_v.sort_by(proof_ordering);
        Ok(())
    }

    /// The canonical JSON of this document.  The normalized form fully
    /// qualifies every DIDURL and is what gets signed and compared across
    /// implementations; the compact form renders same-subject ids as
    /// `#fragment`.
    pub fn to_json(&self, normalized: bool) -> Result<String, Error> {
        let view = self.to_view(normalized, false);
        serde_json::to_string(&view).map_err(|_| {
            Error::MalformedDocument("failed to serialize DID document to canonical JSON".into())
        })
    }

    /// The SHA-256 digest of the normalized canonical bytes with all proofs
    /// removed.  Every document proof signs exactly this.
    pub fn signing_digest(&self) -> Result<[u8; 32], Error> {
        let view = self.to_view(true, true);
        let bytes = serde_json::to_vec(&view).map_err(|_| {
            Error::MalformedDocument("failed to serialize DID document to canonical JSON".into())
        })?;
        Ok(crypto::sha256_digest(&[&bytes]))
    }

    fn to_view(&self, normalized: bool, for_sign: bool) -> DocumentView {
        let controller_v: Vec<String> = self
            .controller_v
            .iter()
            .map(|controller| controller.to_string())
            .collect();
        let render_key_ref = |pk: &PublicKey| {
            if normalized {
                pk.id().to_string()
            } else {
                pk.id().to_compact_string(&self.subject)
            }
        };
        DocumentView {
            id: self.subject.to_string(),
            controller: OneOrMany::from_vec(controller_v),
            multisig: self.multisig_o.map(|multisig| multisig.to_string()),
            public_key: self
                .public_key_map
                .values()
                .map(|pk| pk.to_view(&self.subject, normalized))
                .collect(),
            authentication: self.authentication_keys().map(render_key_ref).collect(),
            authorization: self.authorization_keys().map(render_key_ref).collect(),
            verifiable_credential: self
                .credential_map
                .values()
                .map(|vc| vc.to_view(&self.subject, normalized, false))
                .collect(),
            service: self
                .service_map
                .values()
                .map(|service| service.to_view(&self.subject, normalized))
                .collect(),
            expires: canonical::format_datetime(self.expires),
            proof: if for_sign {
                None
            } else {
                OneOrMany::from_vec(
                    self.proof_v
                        .iter()
                        .map(|proof| {
                            proof.to_view(
                                &self.subject,
                                self.default_public_key_o.as_ref(),
                                normalized,
                            )
                        })
                        .collect(),
                )
            },
        }
    }

    /// Parse a document from its canonical JSON (either mode).  The resolver
    /// is needed to fetch controller documents during sanitization.
    pub fn from_json(s: &str, resolver: &dyn Resolver) -> Result<Self, Error> {
        let raw: DocumentRaw = serde_json::from_str(s)
            .map_err(|_| Error::MalformedDocument("invalid DID document JSON".into()))?;
        Self::from_raw(raw, resolver)
    }

    fn from_raw(raw: DocumentRaw, resolver: &dyn Resolver) -> Result<Self, Error> {
        let subject = raw.id;
        let mut public_key_map = EntryMap::new();
        for pk_raw in raw.public_key {
            let pk = pk_raw.into_public_key(&subject)?;
            public_key_map
                .append(pk)
                .map_err(|_| Error::MalformedDocument("public key already exists".into()))?;
        }
        // Authentication/authorization entries are either bare references to
        // already-declared keys ("virtual" references) or full key blocks.
        for (reference_v, authorization) in
            [(raw.authentication, false), (raw.authorization, true)]
        {
            for reference in reference_v {
                let id = match reference {
                    PublicKeyReferenceRaw::Reference(id) => {
                        let id = id.qualified_with(&subject);
                        if id.did()? != &subject {
                            return Err(Error::MalformedDocument(
                                format!("invalid public key reference: {}", id).into(),
                            ));
                        }
                        if !public_key_map.contains(&id) {
                            return Err(Error::MalformedDocument(
                                format!("not exists public key reference: {}", id).into(),
                            ));
                        }
                        id
                    }
                    PublicKeyReferenceRaw::Key(pk_raw) => {
                        let pk = pk_raw.into_public_key(&subject)?;
                        let id = pk.id().clone();
                        public_key_map.append(pk).map_err(|_| {
                            Error::MalformedDocument("public key already exists".into())
                        })?;
                        id
                    }
                };
                let pk = public_key_map
                    .get_mut(&id)
                    .expect("programmer error: entry was just checked or inserted");
                if authorization {
                    pk.set_authorization_key(true);
                } else {
                    pk.set_authentication_key(true);
                }
            }
        }
        let mut credential_map = EntryMap::new();
        for vc_raw in raw.verifiable_credential {
            let vc = vc_raw.into_credential(Some(&subject))?;
            credential_map
                .append(vc)
                .map_err(|_| Error::MalformedDocument("credential already exists".into()))?;
        }
        let mut service_map = EntryMap::new();
        for service_raw in raw.service {
            let service = service_raw.into_service(&subject)?;
            service_map
                .append(service)
                .map_err(|_| Error::MalformedDocument("service already exists".into()))?;
        }
        let expires = canonical::parse_datetime(&raw.expires)
            .map_err(|_| Error::MalformedDocument("invalid expires datetime".into()))?;
        let mut document = Self {
            subject,
            controller_v: raw
                .controller
                .map(OneOrManyRaw::into_vec)
                .unwrap_or_default(),
            controller_doc_m: HashMap::new(),
            effective_controller_o: None,
            multisig_o: raw.multisig,
            public_key_map,
            default_public_key_o: None,
            credential_map,
            service_map,
            expires,
            proof_v: Vec::new(),
            metadata: DIDMetadata::default(),
        };
        document.sanitize(resolver)?;
        // Proof creators can only be defaulted once sanitization has located
        // the default key and the controllers.
        let pending_v: Vec<PendingProof> = raw
            .proof
            .map(OneOrManyRaw::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(DocumentProofRaw::into_pending)
            .collect::<Result<_, _>>()?;
        for pending in pending_v {
            let creator = document.default_proof_creator(pending.creator_o.clone())?;
            document.add_proof(pending.into_proof(creator)).map_err(|e| match e {
                Error::AlreadySigned(signer) => {
                    Error::MalformedDocument(format!("already exists proof from {}", signer).into())
                }
                e => e,
            })?;
        }
        document.sanitize_proofs()?;
        Ok(document)
    }

    /// Default a proof creator per the document kind: the subject's default
    /// key for a primitive document, the sole controller's default key for a
    /// single-controller customized document; otherwise the creator must be
    /// explicit.
    fn default_proof_creator(&self, creator_o: Option<DIDURL>) -> Result<DIDURL, Error> {
        match creator_o {
            Some(creator) if creator.is_qualified() => Ok(creator),
            Some(relative) => {
                if self.default_public_key_o.is_some() {
                    Ok(relative.qualified_with(&self.subject))
                } else if self.controller_v.len() == 1 {
                    Ok(relative.qualified_with(&self.controller_v[0]))
                } else {
                    Err(Error::MalformedDocument("invalid proof creator key".into()))
                }
            }
            None => {
                if let Some(default_public_key) = &self.default_public_key_o {
                    Ok(default_public_key.clone())
                } else if self.controller_v.len() == 1 {
                    let controller_doc = self
                        .controller_doc_m
                        .get(&self.controller_v[0])
                        .expect("programmer error: controllers were resolved by sanitize");
                    controller_doc
                        .default_public_key_id_o()
                        .cloned()
                        .ok_or(Error::MalformedDocument("missing proof creator key".into()))
                } else {
                    Err(Error::MalformedDocument("missing proof creator key".into()))
                }
            }
        }
    }
}

impl PartialEq for DIDDocument {
    fn eq(&self, other: &Self) -> bool {
        // Structural fields only: metadata and the resolved controller
        // document cache are derived state, not document identity.
        self.subject == other.subject
            && self.controller_v == other.controller_v
            && self.multisig_o == other.multisig_o
            && self.public_key_map == other.public_key_map
            && self.default_public_key_o == other.default_public_key_o
            && self.credential_map == other.credential_map
            && self.service_map == other.service_map
            && self.expires == other.expires
            && self.proof_v == other.proof_v
    }
}

impl Eq for DIDDocument {}

/// Canonical serialization view.  Field declaration order IS the canonical
/// field order: id, controller, multisig, publicKey, authentication,
/// authorization, verifiableCredential, service, expires, proof.
#[serde_with::skip_serializing_none]
#[derive(serde::Serialize)]
struct DocumentView {
    id: String,
    controller: Option<OneOrMany<String>>,
    multisig: Option<String>,
    #[serde(rename = "publicKey")]
    public_key: Vec<PublicKeyView>,
    authentication: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authorization: Vec<String>,
    #[serde(rename = "verifiableCredential", skip_serializing_if = "Vec::is_empty")]
    verifiable_credential: Vec<CredentialView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    service: Vec<ServiceView>,
    expires: String,
    proof: Option<OneOrMany<DocumentProofView>>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DocumentRaw {
    id: DID,
    #[serde(default)]
    controller: Option<OneOrManyRaw<DID>>,
    #[serde(default)]
    multisig: Option<MultiSignature>,
    #[serde(rename = "publicKey", default)]
    public_key: Vec<PublicKeyRaw>,
    #[serde(default)]
    authentication: Vec<PublicKeyReferenceRaw>,
    #[serde(default)]
    authorization: Vec<PublicKeyReferenceRaw>,
    #[serde(rename = "verifiableCredential", default)]
    verifiable_credential: Vec<CredentialRaw>,
    #[serde(default)]
    service: Vec<ServiceRaw>,
    expires: String,
    #[serde(default)]
    proof: Option<OneOrManyRaw<DocumentProofRaw>>,
}
