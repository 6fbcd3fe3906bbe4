use std::collections::HashMap;
use std::str::FromStr;

use did_idchain::{
    DIDDocument, DIDDocumentBuilder, Error, MultiSignature, Resolver, VerifiableCredential,
    CredentialSubject, DID, DIDURL,
};

/// Map-backed resolver; what the explicit resolution-context design buys us
/// in tests.
#[derive(Default)]
struct MapResolver {
    doc_m: HashMap<DID, DIDDocument>,
}

impl MapResolver {
    fn insert(&mut self, doc: DIDDocument) {
        self.doc_m.insert(doc.subject().clone(), doc);
    }
}

impl Resolver for MapResolver {
    fn resolve_did(&self, did: &DID, _force: bool) -> Result<Option<DIDDocument>, Error> {
        Ok(self.doc_m.get(did).cloned())
    }
}

/// Resolver for tests that never touch controllers.
struct EmptyResolver;

impl Resolver for EmptyResolver {
    fn resolve_did(&self, _did: &DID, _force: bool) -> Result<Option<DIDDocument>, Error> {
        Ok(None)
    }
}

fn new_signing_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng)
}

fn new_primitive_doc(
    signing_key: &ed25519_dalek::SigningKey,
    resolver: &dyn Resolver,
) -> DIDDocument {
    DIDDocumentBuilder::new_primitive(&signing_key.verifying_key().to_bytes(), resolver)
        .expect("pass")
        .seal(signing_key)
        .expect("pass")
}

#[test]
fn test_roundtrip_did() {
    let str_v = [
        "did:idchain:iXvzLzR5VHkXr9CVfP2McdBkYp7HyjWnyv",
        "did:idchain:abc",
        "did:idchain:Example123",
    ];
    for s in str_v {
        let did = DID::from_str(s).expect("pass");
        assert_eq!(s, &did.to_string());
    }
    assert!(DID::from_str("did:other:abc").is_err());
    assert!(DID::from_str("did:idchain:").is_err());
    assert!(DID::from_str("idchain:abc").is_err());
}

#[test]
fn test_roundtrip_did_url() {
    let str_v = [
        "did:idchain:abc#primary",
        "did:idchain:abc/path#frag",
        "did:idchain:abc/path?x=y#frag",
        "#frag",
    ];
    for s in str_v {
        let did_url = DIDURL::from_str(s).expect("pass");
        assert_eq!(s, &did_url.to_string());
    }
    let relative = DIDURL::from_str("#frag").expect("pass");
    assert!(!relative.is_qualified());
    let subject = DID::new("abc").expect("pass");
    let qualified = relative.qualified_with(&subject);
    assert_eq!(qualified.to_string(), "did:idchain:abc#frag");
    assert_eq!(qualified.to_compact_string(&subject), "#frag");
}

#[test]
fn test_did_url_ordering_is_case_insensitive() {
    let a = DIDURL::from_str("did:idchain:abc#Alpha").expect("pass");
    let b = DIDURL::from_str("did:idchain:abc#beta").expect("pass");
    assert!(a < b);
}

#[test]
fn test_multisig_spec() {
    let multisig = MultiSignature::from_str("2:3").expect("pass");
    assert_eq!(multisig.m(), 2);
    assert_eq!(multisig.n(), 3);
    assert_eq!(multisig.to_string(), "2:3");
    assert!(MultiSignature::from_str("0:3").is_err());
    assert!(MultiSignature::from_str("4:3").is_err());
    assert!(MultiSignature::from_str("23").is_err());
}

// Scenario: a primitive DID with one self-signed proof from its default key.
#[test]
fn test_primitive_document_is_genuine_and_qualified() {
    let signing_key = new_signing_key();
    let doc = new_primitive_doc(&signing_key, &EmptyResolver);
    assert_eq!(doc.required_signature_count(), 1);
    assert!(doc.is_qualified());
    assert!(doc.is_genuine().expect("pass"));
    assert!(doc.is_valid().expect("pass"));
    assert!(!doc.is_customized());
    let default_key = doc.default_public_key_o().expect("pass");
    assert!(default_key.is_authentication_key());
    assert_eq!(
        doc.proof().expect("pass").creator(),
        default_key.id()
    );
}

#[test]
fn test_canonical_field_order() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let mut builder =
        DIDDocumentBuilder::new_primitive(&signing_key.verifying_key().to_bytes(), &resolver)
            .expect("pass");
    let service_id = DIDURL::from_str("#resolver").expect("pass");
    builder
        .append_service(
            &service_id,
            "DIDResolver".to_string(),
            "https://resolver.example.com".to_string(),
        )
        .expect("pass");
    let doc = builder.seal(&signing_key).expect("pass");

    let json = doc.to_json(true).expect("pass");
    println!("normalized document:\n{}", json);
    let index_of = |field: &str| {
        json.find(&format!("\"{}\":", field))
            .unwrap_or_else(|| panic!("field {} missing", field))
    };
    let order = [
        index_of("id"),
        index_of("publicKey"),
        index_of("authentication"),
        index_of("service"),
        index_of("expires"),
        index_of("proof"),
    ];
    for pair in order.windows(2) {
        assert!(pair[0] < pair[1], "canonical field order violated");
    }
    // Normalized ids are fully qualified; compact ids collapse to fragments.
    assert!(json.contains(&format!("{}#primary", doc.subject())));
    let compact = doc.to_json(false).expect("pass");
    assert!(compact.contains("\"#primary\""));
    assert!(compact.contains("\"#resolver\""));
}

#[test]
fn test_document_roundtrip_both_modes() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let mut builder =
        DIDDocumentBuilder::new_primitive(&signing_key.verifying_key().to_bytes(), &resolver)
            .expect("pass");
    let extra_key = new_signing_key();
    builder
        .append_authentication_key_with(
            &DIDURL::from_str("#key-2").expect("pass"),
            bs58_encode(&extra_key.verifying_key().to_bytes()),
        )
        .expect("pass");
    builder
        .append_service(
            &DIDURL::from_str("#vault").expect("pass"),
            "CredentialVault".to_string(),
            "https://vault.example.com".to_string(),
        )
        .expect("pass");
    let doc = builder.seal(&signing_key).expect("pass");

    for normalized in [true, false] {
        let json = doc.to_json(normalized).expect("pass");
        let parsed = DIDDocument::from_json(&json, &resolver).expect("pass");
        assert_eq!(parsed, doc, "round trip failed (normalized={})", normalized);
        assert!(parsed.is_genuine().expect("pass"));
    }
}

#[test]
fn test_sanitize_is_idempotent() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let doc = new_primitive_doc(&signing_key, &resolver);
    let mut once = doc.clone();
    once.sanitize(&resolver).expect("pass");
    let mut twice = once.clone();
    twice.sanitize(&resolver).expect("pass");
    assert_eq!(once, twice);
    assert_eq!(once, doc);
}

#[test]
fn test_signature_invariant_detects_tampering() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let doc = new_primitive_doc(&signing_key, &resolver);
    let json = doc.to_json(true).expect("pass");

    // Pull the expiry in by a year while keeping the original proof.
    let expires = did_idchain::canonical::format_datetime(doc.expires());
    let tampered_expires = did_idchain::canonical::format_datetime(
        doc.expires()
            .replace_year(doc.expires().year() - 1)
            .expect("pass"),
    );
    let tampered_json = json.replace(&expires, &tampered_expires);
    assert_ne!(json, tampered_json);
    let tampered = DIDDocument::from_json(&tampered_json, &resolver).expect("pass");
    assert!(!tampered.is_genuine().expect("pass"));
    assert!(!tampered.is_valid().expect("pass"));
}

#[test]
fn test_builder_mutation_invalidates_proofs() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let doc = new_primitive_doc(&signing_key, &resolver);

    // Re-sealing without any structural change is double-signing.
    match doc.edit(&resolver).seal(&signing_key) {
        Err(Error::AlreadySigned(_)) => {}
        other => panic!("expected AlreadySigned, got {:?}", other.map(|_| ())),
    }

    // A structural mutation clears the old proof, so the same signer can
    // seal again, and the document stays genuine.
    let mut builder = doc.edit(&resolver);
    builder
        .append_service(
            &DIDURL::from_str("#hub").expect("pass"),
            "Hub".to_string(),
            "https://hub.example.com".to_string(),
        )
        .expect("pass");
    let resealed = builder.seal(&signing_key).expect("pass");
    assert_eq!(resealed.proofs().len(), 1);
    assert!(resealed.is_genuine().expect("pass"));
    assert!(resealed.service(&DIDURL::from_str("#hub").expect("pass")).is_some());
}

#[test]
fn test_wrong_signer_is_rejected() {
    let signing_key = new_signing_key();
    let other_key = new_signing_key();
    let resolver = EmptyResolver;
    let builder =
        DIDDocumentBuilder::new_primitive(&signing_key.verifying_key().to_bytes(), &resolver)
            .expect("pass");
    match builder.seal(&other_key) {
        Err(Error::InvalidKey(_)) => {}
        other => panic!("expected InvalidKey, got {:?}", other.map(|_| ())),
    }
}

// Scenario: a 2-of-3 multisig customized DID with only 1 proof parses but is
// not qualified until a second controller seals it.
#[test]
fn test_customized_multisig_qualification() {
    let key_1 = new_signing_key();
    let key_2 = new_signing_key();
    let key_3 = new_signing_key();
    let mut resolver = MapResolver::default();
    let controller_doc_1 = new_primitive_doc(&key_1, &EmptyResolver);
    let controller_doc_2 = new_primitive_doc(&key_2, &EmptyResolver);
    let controller_doc_3 = new_primitive_doc(&key_3, &EmptyResolver);
    let controller_1 = controller_doc_1.subject().clone();
    let controller_2 = controller_doc_2.subject().clone();
    let controller_3 = controller_doc_3.subject().clone();
    resolver.insert(controller_doc_1);
    resolver.insert(controller_doc_2.clone());
    resolver.insert(controller_doc_3);

    let subject = DID::new("examplecorp").expect("pass");
    let mut builder = DIDDocumentBuilder::new_customized(
        subject.clone(),
        vec![controller_1.clone(), controller_2.clone(), controller_3],
        Some(2),
        &resolver,
    )
    .expect("pass");
    builder.as_controller(controller_1.clone()).expect("pass");
    let partially_sealed = builder.seal(&key_1).expect("pass");
    assert_eq!(partially_sealed.required_signature_count(), 2);
    assert_eq!(partially_sealed.proofs().len(), 1);
    assert!(!partially_sealed.is_qualified());
    assert!(!partially_sealed.is_genuine().expect("pass"));

    // The partial document round-trips through the canonical form, so it can
    // be handed to the next controller for co-signing.
    let json = partially_sealed.to_json(true).expect("pass");
    let reparsed = DIDDocument::from_json(&json, &resolver).expect("pass");
    assert_eq!(reparsed, partially_sealed);
    assert!(!reparsed.is_qualified());

    let fully_sealed = reparsed
        .edit_as(&controller_doc_2, &resolver)
        .expect("pass")
        .seal(&key_2)
        .expect("pass");
    assert_eq!(fully_sealed.proofs().len(), 2);
    assert!(fully_sealed.is_qualified());
    assert!(fully_sealed.is_genuine().expect("pass"));
    assert!(fully_sealed.is_valid().expect("pass"));
}

#[test]
fn test_single_controller_customized_document() {
    let controller_key = new_signing_key();
    let mut resolver = MapResolver::default();
    let controller_doc = new_primitive_doc(&controller_key, &EmptyResolver);
    resolver.insert(controller_doc.clone());

    let subject = DID::new("acme").expect("pass");
    let builder = DIDDocumentBuilder::new_customized(
        subject.clone(),
        vec![controller_doc.subject().clone()],
        None,
        &resolver,
    )
    .expect("pass");
    let doc = builder.seal(&controller_key).expect("pass");
    assert!(doc.is_customized());
    assert!(doc.multisig_o().is_none());
    assert_eq!(doc.effective_controller_o(), Some(controller_doc.subject()));
    assert!(doc.is_qualified());
    assert!(doc.is_genuine().expect("pass"));
    // The sole proof is keyed by the controller and made by its default key.
    let proof = doc.proof().expect("pass");
    assert_eq!(proof.signer().expect("pass"), controller_doc.subject());
}

#[test]
fn test_customized_multisig_arity_is_validated() {
    let key_1 = new_signing_key();
    let key_2 = new_signing_key();
    let mut resolver = MapResolver::default();
    let controller_doc_1 = new_primitive_doc(&key_1, &EmptyResolver);
    let controller_doc_2 = new_primitive_doc(&key_2, &EmptyResolver);
    let controller_1 = controller_doc_1.subject().clone();
    let controller_2 = controller_doc_2.subject().clone();
    resolver.insert(controller_doc_1);
    resolver.insert(controller_doc_2);

    let subject = DID::new("badmultisig").expect("pass");
    // m > n is rejected outright.
    assert!(DIDDocumentBuilder::new_customized(
        subject.clone(),
        vec![controller_1.clone(), controller_2.clone()],
        Some(3),
        &resolver,
    )
    .is_err());
    // Missing multisig with several controllers is rejected too.
    assert!(DIDDocumentBuilder::new_customized(
        subject,
        vec![controller_1, controller_2],
        None,
        &resolver,
    )
    .is_err());
}

#[test]
fn test_credential_seal_and_verify() {
    let issuer_key = new_signing_key();
    let mut resolver = MapResolver::default();
    let issuer_doc = new_primitive_doc(&issuer_key, &EmptyResolver);
    resolver.insert(issuer_doc.clone());

    let mut claims = std::collections::BTreeMap::new();
    claims.insert(
        "name".to_string(),
        serde_json::Value::String("Example Corp".to_string()),
    );
    let owner = issuer_doc.subject().clone();
    let mut credential = VerifiableCredential::new(
        DIDURL::from_str("#profile").expect("pass").qualified_with(&owner),
        vec!["ProfileCredential".to_string(), "SelfProclaimedCredential".to_string()],
        owner.clone(),
        did_idchain::canonical::now_utc_seconds(),
        None,
        CredentialSubject::new(owner.clone(), claims),
    )
    .expect("pass");
    assert!(credential.is_self_proclaimed());
    credential
        .seal(
            &issuer_doc,
            issuer_doc.default_public_key_id_o().expect("pass"),
            &issuer_key,
        )
        .expect("pass");
    assert!(credential.is_genuine(&resolver).expect("pass"));

    let json = credential.to_json(true).expect("pass");
    let parsed = VerifiableCredential::from_json(&json).expect("pass");
    assert_eq!(parsed, credential);
    assert!(parsed.is_genuine(&resolver).expect("pass"));
    // Types come back sorted.
    assert_eq!(
        parsed.types(),
        &[
            "ProfileCredential".to_string(),
            "SelfProclaimedCredential".to_string()
        ]
    );
}

#[test]
fn test_document_with_credential_roundtrip() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let mut builder =
        DIDDocumentBuilder::new_primitive(&signing_key.verifying_key().to_bytes(), &resolver)
            .expect("pass");
    let subject = builder.subject().clone();

    let mut claims = std::collections::BTreeMap::new();
    claims.insert("role".to_string(), serde_json::Value::String("admin".to_string()));
    let credential = VerifiableCredential::new(
        DIDURL::with_fragment(subject.clone(), "role").expect("pass"),
        vec!["RoleCredential".to_string()],
        subject.clone(),
        did_idchain::canonical::now_utc_seconds(),
        None,
        CredentialSubject::new(subject.clone(), claims),
    )
    .expect("pass");
    builder.append_credential(credential).expect("pass");
    let doc = builder.seal(&signing_key).expect("pass");
    assert_eq!(doc.credential_count(), 1);

    let json = doc.to_json(true).expect("pass");
    let parsed = DIDDocument::from_json(&json, &resolver).expect("pass");
    assert_eq!(parsed, doc);
    assert!(parsed.is_genuine().expect("pass"));
}

#[test]
fn test_services_sorted_by_id() {
    let signing_key = new_signing_key();
    let resolver = EmptyResolver;
    let mut builder =
        DIDDocumentBuilder::new_primitive(&signing_key.verifying_key().to_bytes(), &resolver)
            .expect("pass");
    for fragment in ["zulu", "Alpha", "mike"] {
        builder
            .append_service(
                &DIDURL::from_str(&format!("#{}", fragment)).expect("pass"),
                "Service".to_string(),
                format!("https://{}.example.com", fragment.to_lowercase()),
            )
            .expect("pass");
    }
    let doc = builder.seal(&signing_key).expect("pass");
    let fragment_v: Vec<&str> = doc
        .services()
        .map(|service| service.id().fragment_o().expect("pass"))
        .collect();
    // Ascending, case-insensitively.
    assert_eq!(fragment_v, vec!["Alpha", "mike", "zulu"]);
}

#[test]
fn test_malformed_documents_are_rejected() {
    let resolver = EmptyResolver;
    // No default key and no controllers.
    let json = r#"{"id":"did:idchain:abc","publicKey":[],"authentication":[],"expires":"2030-01-01T00:00:00Z"}"#;
    assert!(matches!(
        DIDDocument::from_json(json, &resolver),
        Err(Error::MalformedDocument(_))
    ));
    // Multisig without controllers.
    let json = r#"{"id":"did:idchain:abc","multisig":"2:3","publicKey":[],"authentication":[],"expires":"2030-01-01T00:00:00Z"}"#;
    assert!(matches!(
        DIDDocument::from_json(json, &resolver),
        Err(Error::MalformedDocument(_))
    ));
    // Controllers that do not resolve.
    let json = r#"{"id":"did:idchain:abc","controller":"did:idchain:nobody","expires":"2030-01-01T00:00:00Z"}"#;
    assert!(matches!(
        DIDDocument::from_json(json, &resolver),
        Err(Error::MalformedDocument(_))
    ));
}

fn bs58_encode(bytes: &[u8]) -> String {
    did_idchain::crypto::base58_encode(bytes)
}
