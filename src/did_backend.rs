use std::time::Duration;

use crate::{
    resolve_cache::ResolveCache,
    resolve_request::{
        credential_list_request, credential_resolve_cache_key, credential_resolve_request,
        did_resolve_cache_key, did_resolve_request,
    },
    resolve_response::ResolveResponse,
    CredentialBiography, CredentialBiographyStatus, CredentialList, CredentialMetadata,
    CredentialRequest, DIDAdapter, DIDBiography, DIDBiographyStatus, DIDDocument, DIDMetadata,
    DIDRequest, Error, IDChainRequestOperation, Resolver, TransferTicket, VerifiableCredential,
    DID, DIDURL,
};

pub const DEFAULT_CACHE_INITIAL_CAPACITY: usize = 16;
pub const DEFAULT_CACHE_MAX_CAPACITY: usize = 64;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// How many consecutive unused derived-key indices a wallet synchronization
/// pass probes past the last known index before it stops.  Kept as an
/// explicit, configurable constant rather than a literal buried in sync
/// logic.  Key derivation itself lives outside this crate; this is the
/// interface constant for it.
pub const DEFAULT_BLANK_SCAN_WINDOW: u32 = 20;

/// Configuration for a [DIDBackend].
#[derive(Clone, Debug)]
pub struct DIDBackendConfig {
    pub initial_cache_capacity: usize,
    pub max_cache_capacity: usize,
    pub cache_ttl: Duration,
    /// See [DEFAULT_BLANK_SCAN_WINDOW].
    pub blank_scan_window: u32,
}

impl Default for DIDBackendConfig {
    fn default() -> Self {
        Self {
            initial_cache_capacity: DEFAULT_CACHE_INITIAL_CAPACITY,
            max_cache_capacity: DEFAULT_CACHE_MAX_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            blank_scan_window: DEFAULT_BLANK_SCAN_WINDOW,
        }
    }
}

/// The two kinds of confirmed resolve results the cache holds.
#[derive(Clone)]
enum CachedResult {
    DID(DIDBiography),
    Credential(CredentialBiography),
}

/// The resolution protocol: resolves identifiers to authoritative current
/// state and submits new transactions, through an injected transport adapter,
/// with a bounded single-flight cache in front of it.
///
/// There is deliberately no shared global instance; a backend is passed
/// explicitly (usually as `&dyn Resolver`) into every operation that needs to
/// resolve controllers or check biographies.
pub struct DIDBackend {
    adapter: Box<dyn DIDAdapter>,
    cache: ResolveCache<CachedResult>,
    config: DIDBackendConfig,
}

impl DIDBackend {
    pub fn new(adapter: Box<dyn DIDAdapter>, config: DIDBackendConfig) -> Self {
        let cache = ResolveCache::new(
            config
                .initial_cache_capacity
                .min(config.max_cache_capacity),
            config.max_cache_capacity,
            config.cache_ttl,
        );
        Self {
            adapter,
            cache,
            config,
        }
    }

    pub fn with_default_config(adapter: Box<dyn DIDAdapter>) -> Self {
        Self::new(adapter, DIDBackendConfig::default())
    }

    pub fn config(&self) -> &DIDBackendConfig {
        &self.config
    }

    /// Drop every cached resolve result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn generate_request_id() -> String {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..32)
            .map(|_| {
                std::char::from_digit(rng.gen_range(0..16u32), 16)
                    .expect("programmer error: digit is always < 16")
            })
            .collect()
    }

    fn resolve_raw(&self, request_json: &str) -> Result<serde_json::Value, Error> {
        let response_bytes = self.adapter.resolve(request_json)?;
        ResolveResponse::extract_result(&response_bytes)
    }

    /// Resolve the transaction history for a DID: all of it (`all`) or just
    /// enough to interpret the current state.
    pub fn resolve_did_biography(
        &self,
        did: &DID,
        all: bool,
        force: bool,
    ) -> Result<DIDBiography, Error> {
        tracing::debug!(did = %did, all, force, "resolving DID biography");
        let key = did_resolve_cache_key(did, all);
        let cached = self.cache.get_or_resolve(&key, force, || {
            let request = did_resolve_request(Self::generate_request_id(), did.clone(), all);
            let result = self.resolve_raw(&request.to_json())?;
            Ok(CachedResult::DID(DIDBiography::from_json_value(
                result, self,
            )?))
        })?;
        match cached {
            CachedResult::DID(biography) => Ok(biography),
            CachedResult::Credential(_) => Err(Error::DIDResolve(
                "cache returned a credential biography for a DID key".into(),
            )),
        }
    }

    /// Resolve a DID to its verified current document, or None for a
    /// confirmed NOT_FOUND.  Interprets the biography per the status state
    /// machine; any shape or signature violation is a resolution error, never
    /// a silent absence.
    pub fn resolve_did(&self, did: &DID, force: bool) -> Result<Option<DIDDocument>, Error> {
        tracing::debug!(did = %did, force, "resolving DID");
        let biography = self.resolve_did_biography(did, false, force)?;
        let (transaction, deactivated) = match biography.status() {
            DIDBiographyStatus::NotFound => return Ok(None),
            DIDBiographyStatus::Valid => {
                let transaction = biography.transaction(0).ok_or(Error::DIDResolve(
                    "invalid DID biography, wrong transaction count".into(),
                ))?;
                (transaction, false)
            }
            DIDBiographyStatus::Deactivated => {
                if biography.transaction_count() != 2 {
                    return Err(Error::DIDResolve(
                        "invalid DID biography, wrong transaction count".into(),
                    ));
                }
                let deactivate_transaction = biography
                    .transaction(0)
                    .expect("programmer error: transaction count was just checked");
                if deactivate_transaction.request().operation()
                    != IDChainRequestOperation::Deactivate
                {
                    return Err(Error::DIDResolve("invalid DID biography, wrong status".into()));
                }
                // The second transaction holds the last valid state; it is
                // verified against its own embedded document, never by
                // re-entering resolution for this DID.
                let transaction = biography
                    .transaction(1)
                    .expect("programmer error: transaction count was just checked");
                (transaction, true)
            }
            DIDBiographyStatus::Expired => {
                return Err(Error::DIDResolve(
                    "invalid DID biography, unsupported status".into(),
                ));
            }
        };
        match transaction.request().operation() {
            IDChainRequestOperation::Create
            | IDChainRequestOperation::Update
            | IDChainRequestOperation::Transfer => {}
            _ => {
                return Err(Error::DIDResolve(
                    "invalid ID transaction, unknown operation".into(),
                ));
            }
        }
        if !transaction.request().is_valid(self)? {
            return Err(Error::DIDResolve(
                "invalid ID transaction, signature mismatch".into(),
            ));
        }
        let mut doc = transaction
            .request()
            .document_o()
            .cloned()
            .ok_or(Error::DIDResolve(
                "invalid DID biography, invalid transactions".into(),
            ))?;
        let mut metadata = DIDMetadata {
            transaction_id_o: Some(transaction.txid().to_string()),
            signature_o: Some(doc.proof()?.signature().to_string()),
            deactivated,
            ..DIDMetadata::default()
        };
        metadata.set_published(transaction.timestamp());
        doc.set_metadata(metadata);
        Ok(Some(doc))
    }

    /// Resolve the transaction history for a credential.  The optional issuer
    /// widens the revocation search to revocations issued by that party.
    pub fn resolve_credential_biography(
        &self,
        id: &DIDURL,
        issuer_o: Option<&DID>,
        force: bool,
    ) -> Result<CredentialBiography, Error> {
        tracing::debug!(id = %id, issuer = ?issuer_o, force, "resolving credential biography");
        let key = credential_resolve_cache_key(id, issuer_o);
        let cached = self.cache.get_or_resolve(&key, force, || {
            let request = credential_resolve_request(
                Self::generate_request_id(),
                id.clone(),
                issuer_o.cloned(),
            );
            let result = self.resolve_raw(&request.to_json())?;
            Ok(CachedResult::Credential(
                CredentialBiography::from_json_value(result)?,
            ))
        })?;
        match cached {
            CachedResult::Credential(biography) => Ok(biography),
            CachedResult::DID(_) => Err(Error::DIDResolve(
                "cache returned a DID biography for a credential key".into(),
            )),
        }
    }

    /// Resolve a credential to its declared, verified form.  Returns None for
    /// a confirmed NOT_FOUND and for a revoked credential; the revoked
    /// biography stays cached, so later lookups observe revoked=true.
    pub fn resolve_credential(
        &self,
        id: &DIDURL,
        issuer_o: Option<&DID>,
        force: bool,
    ) -> Result<Option<VerifiableCredential>, Error> {
        tracing::debug!(id = %id, force, "resolving credential");
        let biography = self.resolve_credential_biography(id, issuer_o, force)?;
        match biography.status() {
            CredentialBiographyStatus::NotFound => Ok(None),
            CredentialBiographyStatus::Valid => {
                let transaction = biography.transaction(0).ok_or(Error::DIDResolve(
                    "invalid credential biography, wrong transaction count".into(),
                ))?;
                if transaction.request().operation() != IDChainRequestOperation::Declare {
                    return Err(Error::DIDResolve(
                        "invalid credential transaction, unknown operation".into(),
                    ));
                }
                if !transaction.request().is_valid(self)? {
                    return Err(Error::DIDResolve(
                        "invalid credential transaction, signature mismatch".into(),
                    ));
                }
                let mut credential = transaction
                    .request()
                    .credential_o()
                    .cloned()
                    .ok_or(Error::DIDResolve(
                        "invalid credential biography, invalid transactions".into(),
                    ))?;
                let mut metadata = CredentialMetadata {
                    transaction_id_o: Some(transaction.txid().to_string()),
                    revoked: false,
                    ..CredentialMetadata::default()
                };
                metadata.set_published(transaction.timestamp());
                credential.set_metadata(metadata);
                Ok(Some(credential))
            }
            CredentialBiographyStatus::Revoked => {
                let revoke_transaction = biography.transaction(0).ok_or(Error::DIDResolve(
                    "invalid credential biography, wrong transaction count".into(),
                ))?;
                if revoke_transaction.request().operation() != IDChainRequestOperation::Revoke {
                    return Err(Error::DIDResolve(
                        "invalid credential biography, wrong status".into(),
                    ));
                }
                match biography.transaction_count() {
                    1 => {
                        // A revocation with no visible declaration: the sole
                        // REVOKE transaction must stand on its own signature.
                        if !revoke_transaction.request().is_valid(self)? {
                            return Err(Error::DIDResolve(
                                "invalid credential biography, transaction signature mismatch"
                                    .into(),
                            ));
                        }
                        Ok(None)
                    }
                    2 => {
                        // Re-validate the DECLARE using its embedded
                        // credential before trusting the revoked verdict.
                        let declare_transaction = biography
                            .transaction(1)
                            .expect("programmer error: transaction count was just checked");
                        if declare_transaction.request().operation()
                            != IDChainRequestOperation::Declare
                        {
                            return Err(Error::DIDResolve(
                                "invalid credential biography, invalid transactions".into(),
                            ));
                        }
                        if !declare_transaction.request().is_valid(self)? {
                            return Err(Error::DIDResolve(
                                "invalid credential biography, transaction signature mismatch"
                                    .into(),
                            ));
                        }
                        Ok(None)
                    }
                    _ => Err(Error::DIDResolve(
                        "invalid credential biography, wrong transaction count".into(),
                    )),
                }
            }
        }
    }

    /// List the declared credential ids owned by a DID, paginated via
    /// skip/limit.  Never cached.
    pub fn list_credentials(
        &self,
        did: &DID,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<DIDURL>, Error> {
        tracing::debug!(did = %did, skip, limit, "listing credentials");
        let request =
            credential_list_request(Self::generate_request_id(), did.clone(), skip, limit);
        let result = self.resolve_raw(&request.to_json())?;
        let list: CredentialList = serde_json::from_value(result)
            .map_err(|_| Error::MalformedResolveResponse("invalid credential list".into()))?;
        Ok(list.credentials)
    }

    fn create_transaction(&self, payload: String, memo: &str) -> Result<(), Error> {
        tracing::info!("creating ID transaction");
        self.adapter.create_id_transaction(&payload, memo)?;
        tracing::info!("ID transaction complete");
        Ok(())
    }

    fn check_qualified(doc: &DIDDocument) -> Result<(), Error> {
        if !doc.is_qualified() {
            return Err(Error::NotQualified(format!(
                "document has {} of {} required proofs",
                doc.proofs().len(),
                doc.required_signature_count()
            )
            .into()));
        }
        Ok(())
    }

    fn invalidate_did_cache(&self, did: &DID) {
        self.cache.remove(&did_resolve_cache_key(did, true));
        self.cache.remove(&did_resolve_cache_key(did, false));
    }

    fn invalidate_credential_cache(&self, id: &DIDURL, issuer_o: Option<&DID>) {
        if let Some(issuer) = issuer_o {
            self.cache
                .remove(&credential_resolve_cache_key(id, Some(issuer)));
        }
        self.cache.remove(&credential_resolve_cache_key(id, None));
    }

    /// Publish a new DID creation transaction.
    pub fn create_did(
        &self,
        doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        Self::check_qualified(doc)?;
        let request = DIDRequest::create(doc, sign_key, signer)?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_did_cache(doc.subject());
        Ok(())
    }

    /// Publish a DID update transaction against the given previous
    /// transaction id.
    pub fn update_did(
        &self,
        doc: &DIDDocument,
        previous_txid: &str,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        Self::check_qualified(doc)?;
        let request = DIDRequest::update(doc, previous_txid, sign_key, signer)?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_did_cache(doc.subject());
        Ok(())
    }

    /// Publish a customized-DID ownership transfer transaction.
    pub fn transfer_did(
        &self,
        doc: &DIDDocument,
        ticket: &TransferTicket,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        Self::check_qualified(doc)?;
        if ticket.id() != doc.subject() {
            return Err(Error::IllegalArgument(
                "ticket does not transfer this DID".into(),
            ));
        }
        let request = DIDRequest::transfer(doc, ticket, sign_key, signer)?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_did_cache(doc.subject());
        Ok(())
    }

    /// Publish a DID deactivation transaction signed by the document itself
    /// (or, for a customized DID, by a controller's default key).
    pub fn deactivate_did(
        &self,
        doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        let request = DIDRequest::deactivate(doc, sign_key, signer)?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_did_cache(doc.subject());
        Ok(())
    }

    /// Publish a DID deactivation transaction through an authorization key
    /// held by another party.
    pub fn deactivate_did_by_authorization(
        &self,
        target_doc: &DIDDocument,
        target_sign_key: &DIDURL,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        let request = DIDRequest::deactivate_by_authorization(
            target_doc,
            target_sign_key,
            signer_doc,
            sign_key,
            signer,
        )?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_did_cache(target_doc.subject());
        Ok(())
    }

    /// Publish a credential declaration transaction.
    pub fn declare_credential(
        &self,
        credential: &VerifiableCredential,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        let request = CredentialRequest::declare(credential, signer_doc, sign_key, signer)?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_credential_cache(credential.id(), None);
        self.invalidate_credential_cache(credential.id(), Some(credential.issuer()));
        Ok(())
    }

    /// Publish a credential revocation transaction, signed by the owner or
    /// the issuer.
    pub fn revoke_credential(
        &self,
        id: &DIDURL,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        let request = CredentialRequest::revoke(id, signer_doc, sign_key, signer)?;
        self.create_transaction(request.to_json()?, "")?;
        self.invalidate_credential_cache(id, None);
        self.invalidate_credential_cache(id, Some(signer_doc.subject()));
        Ok(())
    }

    /// Publish a document, reconciling against the current chain state:
    /// NOT_FOUND becomes a CREATE; otherwise the local copy must match the
    /// chain by signature before an UPDATE is issued.
    ///
    /// The match is deliberately permissive: either the locally-recorded
    /// previous signature or the current signature equal to the resolved
    /// proof signature is accepted.
    pub fn publish_did(
        &self,
        doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crate::crypto::Signer,
    ) -> Result<(), Error> {
        Self::check_qualified(doc)?;
        if doc.is_deactivated() {
            return Err(Error::DIDDeactivated(doc.subject().to_string().into()));
        }
        tracing::info!(did = %doc.subject(), "publishing DID document");
        match self.resolve_did(doc.subject(), true)? {
            None => self.create_did(doc, sign_key, signer),
            Some(resolved) => {
                if resolved.is_deactivated() {
                    return Err(Error::DIDDeactivated(doc.subject().to_string().into()));
                }
                let resolved_signature = resolved.proof()?.signature().to_string();
                let current_matches =
                    doc.metadata().signature_o.as_deref() == Some(resolved_signature.as_str());
                let previous_matches = doc.metadata().previous_signature_o.as_deref()
                    == Some(resolved_signature.as_str());
                if !current_matches && !previous_matches {
                    return Err(Error::DIDNotUpToDate(doc.subject().to_string().into()));
                }
                let previous_txid = resolved
                    .metadata()
                    .transaction_id_o
                    .clone()
                    .ok_or(Error::DIDResolve(
                        "resolved document carries no transaction id".into(),
                    ))?;
                self.update_did(doc, &previous_txid, sign_key, signer)
            }
        }
    }
}

impl Resolver for DIDBackend {
    fn resolve_did(&self, did: &DID, force: bool) -> Result<Option<DIDDocument>, Error> {
        DIDBackend::resolve_did(self, did, force)
    }
}
