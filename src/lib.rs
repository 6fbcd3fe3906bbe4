pub mod canonical;
mod credential_biography;
mod credential_request;
pub mod crypto;
mod did;
mod did_adapter;
mod did_backend;
mod did_biography;
mod did_document;
mod did_request;
mod did_url;
mod document_builder;
mod document_metadata;
mod entry_map;
mod error;
mod id_chain_request;
mod multi_signature;
mod proof;
mod public_key;
mod resolve_cache;
pub mod resolve_request;
pub mod resolve_response;
mod resolver;
mod service;
mod transfer_ticket;
mod verifiable_credential;

pub use crate::{
    credential_biography::{
        CredentialBiography, CredentialBiographyStatus, CredentialList, CredentialTransaction,
    },
    credential_request::CredentialRequest,
    did::{DID, DID_METHOD},
    did_adapter::DIDAdapter,
    did_backend::{
        DIDBackend, DIDBackendConfig, DEFAULT_BLANK_SCAN_WINDOW, DEFAULT_CACHE_INITIAL_CAPACITY,
        DEFAULT_CACHE_MAX_CAPACITY, DEFAULT_CACHE_TTL,
    },
    did_biography::{DIDBiography, DIDBiographyStatus, DIDTransaction},
    did_document::DIDDocument,
    did_request::DIDRequest,
    did_url::DIDURL,
    document_builder::{DIDDocumentBuilder, MAX_VALIDITY_YEARS},
    document_metadata::{CredentialMetadata, DIDMetadata},
    entry_map::{DIDEntry, EntryMap},
    error::Error,
    id_chain_request::{
        IDChainHeader, IDChainProof, IDChainRequestOperation, CREDENTIAL_SPECIFICATION,
        DID_SPECIFICATION,
    },
    multi_signature::MultiSignature,
    proof::DocumentProof,
    public_key::{PublicKey, DEFAULT_PUBLIC_KEY_TYPE},
    resolve_cache::ResolveCache,
    resolver::Resolver,
    service::Service,
    transfer_ticket::TransferTicket,
    verifiable_credential::{CredentialProof, CredentialSubject, VerifiableCredential},
};
