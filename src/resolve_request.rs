use crate::{DID, DIDURL};

pub const JSON_RPC_VERSION: &str = "2.0";

pub const METHOD_RESOLVE_DID: &str = "resolvedid";
pub const METHOD_RESOLVE_CREDENTIAL: &str = "resolvecredential";
pub const METHOD_LIST_CREDENTIALS: &str = "listcredentials";

/// A JSON-RPC resolve request envelope.  The params shape is method-specific.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct ResolveRequest<P> {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: P,
}

impl<P: serde::Serialize> ResolveRequest<P> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .expect("programmer error: resolve request params are always serializable")
    }
}

/// Params of a `resolvedid` request.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct DIDResolveParams {
    pub did: DID,
    pub all: bool,
}

/// Params of a `resolvecredential` request.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialResolveParams {
    pub id: DIDURL,
    pub issuer: Option<DID>,
}

/// Params of a `listcredentials` request.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialListParams {
    pub did: DID,
    pub skip: usize,
    pub limit: usize,
}

pub fn did_resolve_request(
    request_id: String,
    did: DID,
    all: bool,
) -> ResolveRequest<DIDResolveParams> {
    ResolveRequest {
        jsonrpc: JSON_RPC_VERSION.to_string(),
        id: request_id,
        method: METHOD_RESOLVE_DID.to_string(),
        params: DIDResolveParams { did, all },
    }
}

pub fn credential_resolve_request(
    request_id: String,
    id: DIDURL,
    issuer_o: Option<DID>,
) -> ResolveRequest<CredentialResolveParams> {
    ResolveRequest {
        jsonrpc: JSON_RPC_VERSION.to_string(),
        id: request_id,
        method: METHOD_RESOLVE_CREDENTIAL.to_string(),
        params: CredentialResolveParams {
            id,
            issuer: issuer_o,
        },
    }
}

pub fn credential_list_request(
    request_id: String,
    did: DID,
    skip: usize,
    limit: usize,
) -> ResolveRequest<CredentialListParams> {
    ResolveRequest {
        jsonrpc: JSON_RPC_VERSION.to_string(),
        id: request_id,
        method: METHOD_LIST_CREDENTIALS.to_string(),
        params: CredentialListParams { did, skip, limit },
    }
}

/// The canonical cache key for a `resolvedid` request: method plus params
/// plus the resolve-all flag.  Request ids never participate.
pub fn did_resolve_cache_key(did: &DID, all: bool) -> String {
    format!("{};{};all={}", METHOD_RESOLVE_DID, did, all)
}

/// The canonical cache key for a `resolvecredential` request, in both the
/// issuer-qualified and unqualified variants.
pub fn credential_resolve_cache_key(id: &DIDURL, issuer_o: Option<&DID>) -> String {
    match issuer_o {
        Some(issuer) => format!("{};{};issuer={}", METHOD_RESOLVE_CREDENTIAL, id, issuer),
        None => format!("{};{}", METHOD_RESOLVE_CREDENTIAL, id),
    }
}
