use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use did_idchain::{
    CredentialBiographyStatus, CredentialSubject, DIDAdapter, DIDBackend, DIDBackendConfig,
    DIDBiographyStatus, DIDDocument, DIDDocumentBuilder, DIDRequest, DIDTransaction, DIDBiography,
    Error, TransferTicket, VerifiableCredential, DID, DIDURL,
};
use did_idchain_mock::{MockAdapter, MockIDChain};

fn new_signing_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng)
}

fn new_backend(chain: &Arc<MockIDChain>) -> DIDBackend {
    DIDBackend::with_default_config(Box::new(MockAdapter::new(chain.clone())))
}

/// Build, seal, and publish a primitive DID document, returning the resolved
/// (metadata-carrying) copy.
fn publish_primitive(backend: &DIDBackend, signing_key: &ed25519_dalek::SigningKey) -> DIDDocument {
    let doc = DIDDocumentBuilder::new_primitive(
        &signing_key.verifying_key().to_bytes(),
        backend,
    )
    .expect("pass")
    .seal(signing_key)
    .expect("pass");
    let sign_key = doc.default_public_key_id_o().expect("pass").clone();
    backend.create_did(&doc, &sign_key, signing_key).expect("pass");
    backend
        .resolve_did(doc.subject(), false)
        .expect("pass")
        .expect("document was just published")
}

#[test]
fn test_create_and_resolve_primitive_did() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let signing_key = new_signing_key();
    let doc = publish_primitive(&backend, &signing_key);

    assert!(doc.is_genuine().expect("pass"));
    assert!(doc.is_valid().expect("pass"));
    assert!(!doc.is_deactivated());
    assert!(doc.metadata().transaction_id_o.is_some());
    assert!(doc.metadata().signature_o.is_some());
    assert!(doc.metadata().published_o.is_some());

    // Creating the same DID again is rejected by the ledger.
    let sign_key = doc.default_public_key_id_o().expect("pass").clone();
    match backend.create_did(&doc, &sign_key, &signing_key) {
        Err(Error::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {:?}", other),
    }

    // An unknown DID is a confirmed absence, not an error.
    let unknown = DID::new("zzzunknownzzz").expect("pass");
    assert!(backend.resolve_did(&unknown, false).expect("pass").is_none());
}

#[test]
fn test_update_did_flow() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let signing_key = new_signing_key();
    let doc = publish_primitive(&backend, &signing_key);
    let sign_key = doc.default_public_key_id_o().expect("pass").clone();
    let previous_txid = doc
        .metadata()
        .transaction_id_o
        .clone()
        .expect("resolved documents carry a txid");

    let mut builder = doc.edit(&backend);
    builder
        .append_service(
            &DIDURL::from_str("#hub").expect("pass"),
            "Hub".to_string(),
            "https://hub.example.com".to_string(),
        )
        .expect("pass");
    let updated = builder.seal(&signing_key).expect("pass");
    backend
        .update_did(&updated, &previous_txid, &sign_key, &signing_key)
        .expect("pass");

    let resolved = backend
        .resolve_did(doc.subject(), false)
        .expect("pass")
        .expect("pass");
    assert!(resolved
        .service(&DIDURL::from_str("#hub").expect("pass"))
        .is_some());
    assert!(resolved.is_valid().expect("pass"));

    // Updating against a stale previous txid is a state violation.
    let mut builder = resolved.edit(&backend);
    builder
        .append_service(
            &DIDURL::from_str("#hub2").expect("pass"),
            "Hub".to_string(),
            "https://hub2.example.com".to_string(),
        )
        .expect("pass");
    let stale_update = builder.seal(&signing_key).expect("pass");
    match backend.update_did(&stale_update, &previous_txid, &sign_key, &signing_key) {
        Err(Error::DIDNotUpToDate(_)) => {}
        other => panic!("expected DIDNotUpToDate, got {:?}", other),
    }
}

#[test]
fn test_deactivate_did() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let signing_key = new_signing_key();
    let doc = publish_primitive(&backend, &signing_key);
    let sign_key = doc.default_public_key_id_o().expect("pass").clone();

    backend
        .deactivate_did(&doc, &sign_key, &signing_key)
        .expect("pass");

    // A deactivated DID still resolves to its last valid state, flagged.
    let resolved = backend
        .resolve_did(doc.subject(), false)
        .expect("pass")
        .expect("pass");
    assert!(resolved.is_deactivated());
    assert!(!resolved.is_valid().expect("pass"));
    assert!(resolved.is_genuine().expect("pass"));

    let biography = backend
        .resolve_did_biography(doc.subject(), false, false)
        .expect("pass");
    assert_eq!(biography.status(), DIDBiographyStatus::Deactivated);
    assert_eq!(biography.transaction_count(), 2);

    // No further life after deactivation.
    match backend.deactivate_did(&doc, &sign_key, &signing_key) {
        Err(Error::DIDDeactivated(_)) => {}
        other => panic!("expected DIDDeactivated, got {:?}", other),
    }
}

#[test]
fn test_deactivate_by_authorization() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let authorizer_key = new_signing_key();
    let authorizer_doc = publish_primitive(&backend, &authorizer_key);

    // The target carries an authorization key holding the authorizer's key
    // material, controlled by the authorizer.
    let target_key = new_signing_key();
    let mut builder =
        DIDDocumentBuilder::new_primitive(&target_key.verifying_key().to_bytes(), &backend)
            .expect("pass");
    builder
        .append_authorization_key_with(
            &DIDURL::from_str("#recovery").expect("pass"),
            authorizer_doc.subject().clone(),
            did_idchain::crypto::base58_encode(&authorizer_key.verifying_key().to_bytes()),
        )
        .expect("pass");
    let target_doc = builder.seal(&target_key).expect("pass");
    let target_sign_key = target_doc.default_public_key_id_o().expect("pass").clone();
    backend
        .create_did(&target_doc, &target_sign_key, &target_key)
        .expect("pass");

    backend
        .deactivate_did_by_authorization(
            &target_doc,
            &DIDURL::from_str("#recovery").expect("pass"),
            &authorizer_doc,
            authorizer_doc.default_public_key_id_o().expect("pass"),
            &authorizer_key,
        )
        .expect("pass");

    let resolved = backend
        .resolve_did(target_doc.subject(), false)
        .expect("pass")
        .expect("pass");
    assert!(resolved.is_deactivated());
}

#[test]
fn test_customized_did_multisig_end_to_end() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let key_1 = new_signing_key();
    let key_2 = new_signing_key();
    let key_3 = new_signing_key();
    let controller_doc_1 = publish_primitive(&backend, &key_1);
    let controller_doc_2 = publish_primitive(&backend, &key_2);
    let controller_doc_3 = publish_primitive(&backend, &key_3);

    let subject = DID::new("examplecorp").expect("pass");
    let mut builder = DIDDocumentBuilder::new_customized(
        subject.clone(),
        vec![
            controller_doc_1.subject().clone(),
            controller_doc_2.subject().clone(),
            controller_doc_3.subject().clone(),
        ],
        Some(2),
        &backend,
    )
    .expect("pass");
    builder
        .as_controller(controller_doc_1.subject().clone())
        .expect("pass");
    let partially_sealed = builder.seal(&key_1).expect("pass");
    assert!(!partially_sealed.is_qualified());

    // Publishing an unqualified document is a state error.
    let sign_key = controller_doc_1
        .default_public_key_id_o()
        .expect("pass")
        .clone();
    match backend.create_did(&partially_sealed, &sign_key, &key_1) {
        Err(Error::NotQualified(_)) => {}
        other => panic!("expected NotQualified, got {:?}", other),
    }

    let fully_sealed = partially_sealed
        .edit_as(&controller_doc_2, &backend)
        .expect("pass")
        .seal(&key_2)
        .expect("pass");
    assert!(fully_sealed.is_qualified());
    backend
        .create_did(&fully_sealed, &sign_key, &key_1)
        .expect("pass");

    let resolved = backend
        .resolve_did(&subject, false)
        .expect("pass")
        .expect("pass");
    assert!(resolved.is_customized());
    assert_eq!(resolved.controller_count(), 3);
    assert_eq!(resolved.proofs().len(), 2);
    assert!(resolved.is_genuine().expect("pass"));
    assert!(resolved.is_valid().expect("pass"));
}

#[test]
fn test_transfer_did() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let key_1 = new_signing_key();
    let key_2 = new_signing_key();
    let controller_doc_1 = publish_primitive(&backend, &key_1);
    let controller_doc_2 = publish_primitive(&backend, &key_2);

    let subject = DID::new("acmetransfer").expect("pass");
    let doc = DIDDocumentBuilder::new_customized(
        subject.clone(),
        vec![controller_doc_1.subject().clone()],
        None,
        &backend,
    )
    .expect("pass")
    .seal(&key_1)
    .expect("pass");
    let sign_key_1 = controller_doc_1
        .default_public_key_id_o()
        .expect("pass")
        .clone();
    backend.create_did(&doc, &sign_key_1, &key_1).expect("pass");

    // The current controller authorizes the transfer with a sealed ticket
    // pinning the latest transaction.
    let resolved = backend
        .resolve_did(&subject, false)
        .expect("pass")
        .expect("pass");
    let mut ticket =
        TransferTicket::new(&resolved, controller_doc_2.subject().clone()).expect("pass");
    ticket.seal(&controller_doc_1, &key_1).expect("pass");
    assert!(ticket.is_valid(&backend).expect("pass"));

    let new_doc = DIDDocumentBuilder::new_customized(
        subject.clone(),
        vec![controller_doc_2.subject().clone()],
        None,
        &backend,
    )
    .expect("pass")
    .seal(&key_2)
    .expect("pass");
    let sign_key_2 = controller_doc_2
        .default_public_key_id_o()
        .expect("pass")
        .clone();
    backend
        .transfer_did(&new_doc, &ticket, &sign_key_2, &key_2)
        .expect("pass");

    let resolved = backend
        .resolve_did(&subject, false)
        .expect("pass")
        .expect("pass");
    assert_eq!(resolved.controllers(), &[controller_doc_2.subject().clone()]);
    assert!(resolved.is_valid().expect("pass"));
}

fn self_proclaimed_credential(owner_doc: &DIDDocument, fragment: &str) -> VerifiableCredential {
    let owner = owner_doc.subject().clone();
    let mut claims = std::collections::BTreeMap::new();
    claims.insert(
        "name".to_string(),
        serde_json::Value::String("Example".to_string()),
    );
    VerifiableCredential::new(
        DIDURL::with_fragment(owner.clone(), fragment).expect("pass"),
        vec!["SelfProclaimedCredential".to_string()],
        owner.clone(),
        did_idchain::canonical::now_utc_seconds(),
        None,
        CredentialSubject::new(owner, claims),
    )
    .expect("pass")
}

#[test]
fn test_declare_and_resolve_credential() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let owner_key = new_signing_key();
    let owner_doc = publish_primitive(&backend, &owner_key);
    let sign_key = owner_doc.default_public_key_id_o().expect("pass").clone();

    let mut credential = self_proclaimed_credential(&owner_doc, "profile");
    credential
        .seal(&owner_doc, &sign_key, &owner_key)
        .expect("pass");
    backend
        .declare_credential(&credential, &owner_doc, &sign_key, &owner_key)
        .expect("pass");

    let resolved = backend
        .resolve_credential(credential.id(), None, false)
        .expect("pass")
        .expect("pass");
    assert_eq!(resolved, credential);
    assert!(!resolved.metadata().revoked);
    assert!(resolved.metadata().transaction_id_o.is_some());
    assert!(resolved.is_genuine(&backend).expect("pass"));

    let credential_id_v = backend
        .list_credentials(owner_doc.subject(), 0, 10)
        .expect("pass");
    assert!(credential_id_v.contains(credential.id()));

    // Declaring twice is rejected.
    match backend.declare_credential(&credential, &owner_doc, &sign_key, &owner_key) {
        Err(Error::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
}

// Scenario: a credential with biography [REVOKE, DECLARE] resolves to None
// while the cached biography records the revocation.
#[test]
fn test_revoke_credential() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let owner_key = new_signing_key();
    let owner_doc = publish_primitive(&backend, &owner_key);
    let sign_key = owner_doc.default_public_key_id_o().expect("pass").clone();

    let mut credential = self_proclaimed_credential(&owner_doc, "revokable");
    credential
        .seal(&owner_doc, &sign_key, &owner_key)
        .expect("pass");
    backend
        .declare_credential(&credential, &owner_doc, &sign_key, &owner_key)
        .expect("pass");
    backend
        .revoke_credential(credential.id(), &owner_doc, &sign_key, &owner_key)
        .expect("pass");

    assert!(backend
        .resolve_credential(credential.id(), None, false)
        .expect("pass")
        .is_none());
    let biography = backend
        .resolve_credential_biography(credential.id(), None, false)
        .expect("pass");
    assert_eq!(biography.status(), CredentialBiographyStatus::Revoked);
    assert_eq!(biography.transaction_count(), 2);

    // Revoking twice is rejected; declaring after revocation is rejected.
    match backend.revoke_credential(credential.id(), &owner_doc, &sign_key, &owner_key) {
        Err(Error::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
    match backend.declare_credential(&credential, &owner_doc, &sign_key, &owner_key) {
        Err(Error::IllegalArgument(_)) => {}
        other => panic!("expected IllegalArgument, got {:?}", other),
    }
}

#[test]
fn test_revoke_without_declare() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let owner_key = new_signing_key();
    let owner_doc = publish_primitive(&backend, &owner_key);
    let sign_key = owner_doc.default_public_key_id_o().expect("pass").clone();

    let id = DIDURL::with_fragment(owner_doc.subject().clone(), "neverdeclared").expect("pass");
    backend
        .revoke_credential(&id, &owner_doc, &sign_key, &owner_key)
        .expect("pass");

    // The revocation stands on its own signature; the credential is simply
    // absent.
    assert!(backend
        .resolve_credential(&id, None, false)
        .expect("pass")
        .is_none());
    let biography = backend
        .resolve_credential_biography(&id, None, false)
        .expect("pass");
    assert_eq!(biography.status(), CredentialBiographyStatus::Revoked);
    assert_eq!(biography.transaction_count(), 1);
}

/// Serves a fixed biography for every resolvedid call; for shape-enforcement
/// tests that need histories a well-behaved ledger would never emit.
struct ScriptedAdapter {
    result: serde_json::Value,
}

impl DIDAdapter for ScriptedAdapter {
    fn resolve(&self, _request_json: &str) -> Result<Vec<u8>, Error> {
        Ok(
            did_idchain::resolve_response::ResolveResponse::success(
                "scripted".to_string(),
                self.result.clone(),
            )
            .to_json()
            .into_bytes(),
        )
    }
    fn create_id_transaction(&self, _payload: &str, _memo: &str) -> Result<(), Error> {
        Err(Error::DIDTransport("scripted adapter cannot submit".into()))
    }
}

// Scenario: a DEACTIVATED biography with a single transaction is a resolution
// error, not a silent absence.
#[test]
fn test_biography_shape_enforcement() {
    let signing_key = new_signing_key();
    let chain = Arc::new(MockIDChain::new());
    let publish_backend = new_backend(&chain);
    let doc = publish_primitive(&publish_backend, &signing_key);
    let sign_key = doc.default_public_key_id_o().expect("pass").clone();
    let deactivate_request = DIDRequest::deactivate(&doc, &sign_key, &signing_key).expect("pass");
    let deactivate_tx = DIDTransaction::new(
        "ffffffffffffffffffffffff".to_string(),
        time::OffsetDateTime::now_utc(),
        deactivate_request,
    );

    let one_tx_deactivated = DIDBiography::new(
        doc.subject().clone(),
        DIDBiographyStatus::Deactivated,
        vec![deactivate_tx.clone()],
    );
    let backend = DIDBackend::with_default_config(Box::new(ScriptedAdapter {
        result: one_tx_deactivated.to_json_value().expect("pass"),
    }));
    match backend.resolve_did(doc.subject(), false) {
        Err(Error::DIDResolve(message)) => {
            assert!(message.contains("wrong transaction count"), "{}", message);
        }
        other => panic!("expected DIDResolve, got {:?}", other),
    }

    // A VALID biography whose newest operation is DEACTIVATE is equally
    // malformed.
    let valid_with_deactivate = DIDBiography::new(
        doc.subject().clone(),
        DIDBiographyStatus::Valid,
        vec![deactivate_tx],
    );
    let backend = DIDBackend::with_default_config(Box::new(ScriptedAdapter {
        result: valid_with_deactivate.to_json_value().expect("pass"),
    }));
    match backend.resolve_did(doc.subject(), false) {
        Err(Error::DIDResolve(message)) => {
            assert!(message.contains("unknown operation"), "{}", message);
        }
        other => panic!("expected DIDResolve, got {:?}", other),
    }
}

/// Counts transport round trips on the way through to the mock chain.
struct CountingAdapter {
    inner: MockAdapter,
    resolve_count: AtomicUsize,
}

impl CountingAdapter {
    fn new(chain: Arc<MockIDChain>) -> Self {
        Self {
            inner: MockAdapter::new(chain),
            resolve_count: AtomicUsize::new(0),
        }
    }
}

impl DIDAdapter for CountingAdapter {
    fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(request_json)
    }
    fn create_id_transaction(&self, payload: &str, memo: &str) -> Result<(), Error> {
        self.inner.create_id_transaction(payload, memo)
    }
}

#[test]
fn test_cache_single_flight() {
    let chain = Arc::new(MockIDChain::with_simulated_latency(
        std::time::Duration::from_millis(20),
    ));
    let signing_key = new_signing_key();
    let publish_backend = new_backend(&chain);
    let doc = publish_primitive(&publish_backend, &signing_key);
    let did = doc.subject().clone();

    let adapter = Arc::new(CountingAdapter::new(chain.clone()));
    struct SharedAdapter(Arc<CountingAdapter>);
    impl DIDAdapter for SharedAdapter {
        fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error> {
            self.0.resolve(request_json)
        }
        fn create_id_transaction(&self, payload: &str, memo: &str) -> Result<(), Error> {
            self.0.create_id_transaction(payload, memo)
        }
    }
    let backend = DIDBackend::with_default_config(Box::new(SharedAdapter(adapter.clone())));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let resolved = backend.resolve_did(&did, false).expect("pass");
                assert!(resolved.is_some());
            });
        }
    });
    assert_eq!(
        adapter.resolve_count.load(Ordering::SeqCst),
        1,
        "N concurrent resolves of one key must produce exactly 1 transport call"
    );

    // force=true always produces a fresh transport call and replaces the
    // cached entry.
    backend.resolve_did(&did, true).expect("pass");
    assert_eq!(adapter.resolve_count.load(Ordering::SeqCst), 2);
    backend.resolve_did(&did, false).expect("pass");
    assert_eq!(adapter.resolve_count.load(Ordering::SeqCst), 2);
}

/// Fails the first `fail_remaining` resolve calls with a transport error.
struct FlakyAdapter {
    inner: MockAdapter,
    fail_remaining: AtomicUsize,
    resolve_count: AtomicUsize,
}

impl DIDAdapter for FlakyAdapter {
    fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
        {
            return Err(Error::DIDTransport("injected transport failure".into()));
        }
        self.inner.resolve(request_json)
    }
    fn create_id_transaction(&self, payload: &str, memo: &str) -> Result<(), Error> {
        self.inner.create_id_transaction(payload, memo)
    }
}

#[test]
fn test_failures_are_not_cached() {
    let chain = Arc::new(MockIDChain::new());
    let signing_key = new_signing_key();
    let publish_backend = new_backend(&chain);
    let doc = publish_primitive(&publish_backend, &signing_key);
    let did = doc.subject().clone();

    let adapter = Arc::new(FlakyAdapter {
        inner: MockAdapter::new(chain.clone()),
        fail_remaining: AtomicUsize::new(1),
        resolve_count: AtomicUsize::new(0),
    });
    struct SharedAdapter(Arc<FlakyAdapter>);
    impl DIDAdapter for SharedAdapter {
        fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error> {
            self.0.resolve(request_json)
        }
        fn create_id_transaction(&self, payload: &str, memo: &str) -> Result<(), Error> {
            self.0.create_id_transaction(payload, memo)
        }
    }
    let backend = DIDBackend::with_default_config(Box::new(SharedAdapter(adapter.clone())));

    // The transport failure surfaces as an error, never as "not found".
    match backend.resolve_did(&did, false) {
        Err(Error::DIDTransport(_)) => {}
        other => panic!("expected DIDTransport, got {:?}", other),
    }
    // The failure was not cached: the retry goes back to the transport and
    // succeeds.
    let resolved = backend.resolve_did(&did, false).expect("pass");
    assert!(resolved.is_some());
    assert_eq!(adapter.resolve_count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cache_ttl_expiry() {
    let chain = Arc::new(MockIDChain::new());
    let signing_key = new_signing_key();
    let publish_backend = new_backend(&chain);
    let doc = publish_primitive(&publish_backend, &signing_key);
    let did = doc.subject().clone();

    let adapter = Arc::new(CountingAdapter::new(chain.clone()));
    struct SharedAdapter(Arc<CountingAdapter>);
    impl DIDAdapter for SharedAdapter {
        fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error> {
            self.0.resolve(request_json)
        }
        fn create_id_transaction(&self, payload: &str, memo: &str) -> Result<(), Error> {
            self.0.create_id_transaction(payload, memo)
        }
    }
    let backend = DIDBackend::new(
        Box::new(SharedAdapter(adapter.clone())),
        DIDBackendConfig {
            cache_ttl: std::time::Duration::from_millis(50),
            ..DIDBackendConfig::default()
        },
    );

    backend.resolve_did(&did, false).expect("pass");
    backend.resolve_did(&did, false).expect("pass");
    assert_eq!(adapter.resolve_count.load(Ordering::SeqCst), 1);

    std::thread::sleep(std::time::Duration::from_millis(80));
    backend.resolve_did(&did, false).expect("pass");
    assert_eq!(adapter.resolve_count.load(Ordering::SeqCst), 2);
}

// Pins the deliberately permissive publish reconciliation: either the
// locally-recorded previous signature or the current signature matching the
// resolved chain signature is accepted.
#[test]
fn test_publish_reconciliation_is_permissive() {
    let chain = Arc::new(MockIDChain::new());
    let backend = new_backend(&chain);
    let signing_key = new_signing_key();

    let doc = DIDDocumentBuilder::new_primitive(
        &signing_key.verifying_key().to_bytes(),
        &backend,
    )
    .expect("pass")
    .seal(&signing_key)
    .expect("pass");
    let sign_key = doc.default_public_key_id_o().expect("pass").clone();

    // NOT_FOUND reconciles to CREATE.
    backend
        .publish_did(&doc, &sign_key, &signing_key)
        .expect("pass");
    let resolved = backend
        .resolve_did(doc.subject(), true)
        .expect("pass")
        .expect("pass");

    // The resolved copy's current signature matches the chain; UPDATE goes
    // through.
    let mut builder = resolved.edit(&backend);
    builder
        .append_service(
            &DIDURL::from_str("#one").expect("pass"),
            "Service".to_string(),
            "https://one.example.com".to_string(),
        )
        .expect("pass");
    let updated = builder.seal(&signing_key).expect("pass");
    assert_eq!(
        updated.metadata().signature_o,
        resolved.metadata().signature_o
    );
    backend
        .publish_did(&updated, &sign_key, &signing_key)
        .expect("pass");

    // A garbled current signature is still accepted as long as the previous
    // signature matches the chain.  Permissive by construction; this test
    // pins that behavior rather than tightening it.
    let resolved = backend
        .resolve_did(doc.subject(), true)
        .expect("pass")
        .expect("pass");
    let chain_signature = resolved.metadata().signature_o.clone();
    let mut builder = resolved.edit(&backend);
    builder
        .append_service(
            &DIDURL::from_str("#two").expect("pass"),
            "Service".to_string(),
            "https://two.example.com".to_string(),
        )
        .expect("pass");
    let mut updated = builder.seal(&signing_key).expect("pass");
    updated.metadata_mut().signature_o = Some("garbled".to_string());
    updated.metadata_mut().previous_signature_o = chain_signature;
    backend
        .publish_did(&updated, &sign_key, &signing_key)
        .expect("pass");

    // With neither signature matching, publish refuses.
    let resolved = backend
        .resolve_did(doc.subject(), true)
        .expect("pass")
        .expect("pass");
    let mut builder = resolved.edit(&backend);
    builder
        .append_service(
            &DIDURL::from_str("#three").expect("pass"),
            "Service".to_string(),
            "https://three.example.com".to_string(),
        )
        .expect("pass");
    let mut updated = builder.seal(&signing_key).expect("pass");
    updated.metadata_mut().signature_o = Some("garbled".to_string());
    updated.metadata_mut().previous_signature_o = Some("also garbled".to_string());
    match backend.publish_did(&updated, &sign_key, &signing_key) {
        Err(Error::DIDNotUpToDate(_)) => {}
        other => panic!("expected DIDNotUpToDate, got {:?}", other),
    }
}
