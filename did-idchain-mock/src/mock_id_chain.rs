use std::collections::HashMap;
use std::sync::Mutex;

use did_idchain::{
    resolve_request::{
        CredentialListParams, CredentialResolveParams, DIDResolveParams, METHOD_LIST_CREDENTIALS,
        METHOD_RESOLVE_CREDENTIAL, METHOD_RESOLVE_DID,
    },
    resolve_response::ResolveResponse,
    CredentialBiography, CredentialBiographyStatus, CredentialList, CredentialRequest,
    CredentialTransaction, DIDBiography, DIDBiographyStatus, DIDDocument, DIDMetadata, DIDRequest,
    DIDTransaction, Error, IDChainRequestOperation, Resolver, CREDENTIAL_SPECIFICATION, DID,
    DIDURL, DID_SPECIFICATION,
};

/// Purely in-memory, intra-process simulated ID chain.  Validates submitted
/// ID chain requests against its own state and serves biographies over the
/// JSON-RPC resolve protocol, so the resolution stack can be exercised
/// end-to-end without a ledger.
pub struct MockIDChain {
    state: Mutex<ChainState>,
    /// Optional simulated network latency.  If present, every chain
    /// operation sleeps for this duration before beginning its work.
    simulated_latency_o: Option<std::time::Duration>,
}

#[derive(Default)]
struct ChainState {
    /// Transactions per DID, most recent first.
    did_transaction_m: HashMap<DID, Vec<DIDTransaction>>,
    /// Transactions per credential id, most recent first.
    credential_transaction_m: HashMap<DIDURL, Vec<CredentialTransaction>>,
    next_txid: u64,
}

impl ChainState {
    fn allocate_txid(&mut self) -> String {
        self.next_txid += 1;
        format!("{:024x}", self.next_txid)
    }
}

/// Resolves DIDs out of the chain's own stored transactions; used to validate
/// incoming requests without going back through any transport.
struct ChainStateResolver<'s> {
    state: &'s ChainState,
}

impl Resolver for ChainStateResolver<'_> {
    fn resolve_did(&self, did: &DID, _force: bool) -> Result<Option<DIDDocument>, Error> {
        let tx_v = match self.state.did_transaction_m.get(did) {
            None => return Ok(None),
            Some(tx_v) => tx_v,
        };
        let newest = &tx_v[0];
        let (tx, deactivated) = if newest.request().operation() == IDChainRequestOperation::Deactivate
        {
            let prior = tx_v.get(1).ok_or(Error::DIDResolve(
                "deactivated DID has no prior state".into(),
            ))?;
            (prior, true)
        } else {
            (newest, false)
        };
        let mut doc = tx
            .request()
            .document_o()
            .cloned()
            .ok_or(Error::DIDResolve("transaction carries no document".into()))?;
        let metadata = DIDMetadata {
            transaction_id_o: Some(tx.txid().to_string()),
            signature_o: Some(doc.proof()?.signature().to_string()),
            published_o: Some(tx.timestamp()),
            deactivated,
            previous_signature_o: None,
        };
        doc.set_metadata(metadata);
        Ok(Some(doc))
    }
}

impl Default for MockIDChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIDChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            simulated_latency_o: None,
        }
    }

    pub fn with_simulated_latency(simulated_latency: std::time::Duration) -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            simulated_latency_o: Some(simulated_latency),
        }
    }

    fn simulate_latency_if_necessary(&self) {
        if let Some(simulated_latency) = self.simulated_latency_o {
            std::thread::sleep(simulated_latency);
        }
    }

    /// Service a JSON-RPC resolve request.  Malformed envelopes and unknown
    /// methods come back as JSON-RPC error responses, never as panics; the
    /// adapter layer stays a dumb pipe.
    pub fn handle_resolve(&self, request_json: &str) -> Vec<u8> {
        self.simulate_latency_if_necessary();
        let envelope: serde_json::Value = match serde_json::from_str(request_json) {
            Ok(envelope) => envelope,
            Err(_) => {
                return ResolveResponse::failure(String::new(), -32700, "parse error".to_string())
                    .to_json()
                    .into_bytes()
            }
        };
        let request_id = envelope
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or("")
            .to_string();
        let method = envelope
            .get("method")
            .and_then(|method| method.as_str())
            .unwrap_or("")
            .to_string();
        let params = envelope.get("params").cloned().unwrap_or(serde_json::Value::Null);
        tracing::debug!(method = method.as_str(), "mock chain servicing resolve request");
        let result = self.dispatch_resolve(&method, params);
        let response = match result {
            Ok(result) => ResolveResponse::success(request_id, result),
            Err(error) => ResolveResponse::failure(request_id, -32602, error.to_string()),
        };
        response.to_json().into_bytes()
    }

    fn dispatch_resolve(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        let state = self.state.lock().expect("mock chain lock poisoned");
        match method {
            METHOD_RESOLVE_DID => {
                let params: DIDResolveParams = serde_json::from_value(params)
                    .map_err(|_| Error::IllegalArgument("invalid resolvedid params".into()))?;
                Self::did_biography(&state, &params.did, params.all).to_json_value()
            }
            METHOD_RESOLVE_CREDENTIAL => {
                let params: CredentialResolveParams = serde_json::from_value(params).map_err(
                    |_| Error::IllegalArgument("invalid resolvecredential params".into()),
                )?;
                Self::credential_biography(&state, &params.id).to_json_value()
            }
            METHOD_LIST_CREDENTIALS => {
                let params: CredentialListParams = serde_json::from_value(params).map_err(
                    |_| Error::IllegalArgument("invalid listcredentials params".into()),
                )?;
                let mut credentials: Vec<DIDURL> = state
                    .credential_transaction_m
                    .iter()
                    .filter(|(id, tx_v)| {
                        id.did_o() == Some(&params.did)
                            && tx_v
                                .iter()
                                .any(|tx| tx.request().operation() == IDChainRequestOperation::Declare)
                    })
                    .map(|(id, _)| id.clone())
                    .collect();
                credentials.sort();
                let credentials = credentials
                    .into_iter()
                    .skip(params.skip)
                    .take(params.limit)
                    .collect();
                let list = CredentialList {
                    did: params.did,
                    credentials,
                };
                serde_json::to_value(&list)
                    .map_err(|_| Error::IllegalArgument("unserializable credential list".into()))
            }
            _ => Err(Error::IllegalArgument("unknown resolve method".into())),
        }
    }

    fn did_biography(state: &ChainState, did: &DID, all: bool) -> DIDBiography {
        match state.did_transaction_m.get(did) {
            None => DIDBiography::new(did.clone(), DIDBiographyStatus::NotFound, Vec::new()),
            Some(tx_v) => {
                let newest = &tx_v[0];
                if newest.request().operation() == IDChainRequestOperation::Deactivate {
                    // The interpretable shape is the deactivation plus the
                    // last valid state; `all` returns the complete history.
                    let transaction_v = if all {
                        tx_v.clone()
                    } else {
                        tx_v.iter().take(2).cloned().collect()
                    };
                    DIDBiography::new(did.clone(), DIDBiographyStatus::Deactivated, transaction_v)
                } else {
                    let transaction_v = if all {
                        tx_v.clone()
                    } else {
                        vec![newest.clone()]
                    };
                    DIDBiography::new(did.clone(), DIDBiographyStatus::Valid, transaction_v)
                }
            }
        }
    }

    fn credential_biography(state: &ChainState, id: &DIDURL) -> CredentialBiography {
        match state.credential_transaction_m.get(id) {
            None => {
                CredentialBiography::new(id.clone(), CredentialBiographyStatus::NotFound, Vec::new())
            }
            Some(tx_v) => {
                let revoked = tx_v
                    .iter()
                    .any(|tx| tx.request().operation() == IDChainRequestOperation::Revoke);
                let status = if revoked {
                    CredentialBiographyStatus::Revoked
                } else {
                    CredentialBiographyStatus::Valid
                };
                CredentialBiography::new(id.clone(), status, tx_v.clone())
            }
        }
    }

    /// Validate and record a submitted ID chain request payload.
    pub fn create_id_transaction(&self, payload: &str) -> Result<(), Error> {
        self.simulate_latency_if_necessary();
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|_| Error::MalformedIDChainRequest("invalid request payload".into()))?;
        let specification = value
            .pointer("/header/specification")
            .and_then(|specification| specification.as_str())
            .ok_or(Error::MalformedIDChainRequest("missing specification".into()))?
            .to_string();
        let mut state = self.state.lock().expect("mock chain lock poisoned");
        match specification.as_str() {
            DID_SPECIFICATION => Self::process_did_request(&mut state, value),
            CREDENTIAL_SPECIFICATION => Self::process_credential_request(&mut state, value),
            _ => Err(Error::MalformedIDChainRequest(
                "unsupported specification".into(),
            )),
        }
    }

    fn process_did_request(state: &mut ChainState, value: serde_json::Value) -> Result<(), Error> {
        let request = {
            let resolver = ChainStateResolver { state: &*state };
            DIDRequest::from_json_value(value, &resolver)?
        };
        let did = request.did().clone();
        let operation = request.operation();
        tracing::info!(did = %did, operation = %operation, "mock chain servicing DID request");
        {
            let resolver = ChainStateResolver { state: &*state };
            if !request.is_valid(&resolver)? {
                return Err(Error::DIDNotGenuine("invalid request signature".into()));
            }
            let current_doc_o = resolver.resolve_did(&did, false)?;
            match operation {
                IDChainRequestOperation::Create => {
                    if current_doc_o.is_some() {
                        return Err(Error::AlreadyExists(did.to_string().into()));
                    }
                    Self::check_publishable(&request)?;
                }
                IDChainRequestOperation::Update => {
                    let current_doc = current_doc_o
                        .as_ref()
                        .ok_or(Error::NotFound(did.to_string().into()))?;
                    if current_doc.is_deactivated() {
                        return Err(Error::DIDDeactivated(did.to_string().into()));
                    }
                    let latest_txid = current_doc
                        .metadata()
                        .transaction_id_o
                        .as_deref()
                        .expect("programmer error: chain-resolved documents carry a txid");
                    if request.previous_txid_o() != Some(latest_txid) {
                        return Err(Error::DIDNotUpToDate(did.to_string().into()));
                    }
                    let new_doc = Self::check_publishable(&request)?;
                    // Controller changes go through TRANSFER, never UPDATE.
                    if new_doc.controllers() != current_doc.controllers()
                        || new_doc.multisig_o() != current_doc.multisig_o()
                    {
                        return Err(Error::IllegalArgument(
                            "updating can not change the controllers".into(),
                        ));
                    }
                }
                IDChainRequestOperation::Transfer => {
                    let current_doc = current_doc_o
                        .as_ref()
                        .ok_or(Error::NotFound(did.to_string().into()))?;
                    if current_doc.is_deactivated() {
                        return Err(Error::DIDDeactivated(did.to_string().into()));
                    }
                    if !current_doc.is_customized() {
                        return Err(Error::NotCustomizedDID(did.to_string().into()));
                    }
                    let ticket = request
                        .transfer_ticket_o()?
                        .ok_or(Error::MalformedIDChainRequest("missing ticket".into()))?;
                    if ticket.id() != &did {
                        return Err(Error::MalformedTransferTicket(
                            "ticket does not transfer this DID".into(),
                        ));
                    }
                    let latest_txid = current_doc
                        .metadata()
                        .transaction_id_o
                        .as_deref()
                        .expect("programmer error: chain-resolved documents carry a txid");
                    if ticket.txid() != latest_txid {
                        return Err(Error::DIDNotUpToDate(
                            "ticket does not pin the latest transaction".into(),
                        ));
                    }
                    if !ticket.is_valid(&resolver)? {
                        return Err(Error::MalformedTransferTicket(
                            "ticket signatures do not qualify".into(),
                        ));
                    }
                    let new_doc = Self::check_publishable(&request)?;
                    if !new_doc.has_controller(ticket.to()) {
                        return Err(Error::IllegalArgument(
                            "ticket receiver is not a controller of the new document".into(),
                        ));
                    }
                }
                IDChainRequestOperation::Deactivate => {
                    let current_doc = current_doc_o
                        .as_ref()
                        .ok_or(Error::NotFound(did.to_string().into()))?;
                    if current_doc.is_deactivated() {
                        return Err(Error::DIDDeactivated(did.to_string().into()));
                    }
                }
                _ => {
                    return Err(Error::MalformedIDChainRequest("invalid operation".into()));
                }
            }
        }
        let txid = state.allocate_txid();
        let transaction =
            DIDTransaction::new(txid, time::OffsetDateTime::now_utc(), request);
        state
            .did_transaction_m
            .entry(did)
            .or_default()
            .insert(0, transaction);
        Ok(())
    }

    /// A publishable DID payload is qualified (full proof set) and unexpired.
    fn check_publishable(request: &DIDRequest) -> Result<&DIDDocument, Error> {
        let doc = request
            .document_o()
            .ok_or(Error::MalformedIDChainRequest("missing document".into()))?;
        if !doc.is_qualified() {
            return Err(Error::NotQualified(doc.subject().to_string().into()));
        }
        if doc.is_expired() {
            return Err(Error::DIDExpired(doc.subject().to_string().into()));
        }
        Ok(doc)
    }

    fn process_credential_request(
        state: &mut ChainState,
        value: serde_json::Value,
    ) -> Result<(), Error> {
        let request = CredentialRequest::from_json_value(value)?;
        let id = request.id().clone();
        let operation = request.operation();
        tracing::info!(id = %id, operation = %operation, "mock chain servicing credential request");
        {
            let resolver = ChainStateResolver { state: &*state };
            if !request.is_valid(&resolver)? {
                return Err(Error::DIDNotGenuine("invalid request signature".into()));
            }
            let tx_v = state.credential_transaction_m.get(&id);
            let declared_o = tx_v.and_then(|tx_v| {
                tx_v.iter()
                    .find(|tx| tx.request().operation() == IDChainRequestOperation::Declare)
            });
            let revoked = tx_v
                .map(|tx_v| {
                    tx_v.iter()
                        .any(|tx| tx.request().operation() == IDChainRequestOperation::Revoke)
                })
                .unwrap_or(false);
            match operation {
                IDChainRequestOperation::Declare => {
                    if declared_o.is_some() {
                        return Err(Error::AlreadyExists(id.to_string().into()));
                    }
                    if revoked {
                        return Err(Error::IllegalArgument(
                            "credential was already revoked".into(),
                        ));
                    }
                }
                IDChainRequestOperation::Revoke => {
                    if revoked {
                        return Err(Error::AlreadyExists(
                            format!("credential already revoked: {}", id).into(),
                        ));
                    }
                    // Only the owner or the issuer may revoke.
                    let signer = request.proof().verification_method.did()?.clone();
                    let owner = id.did()?.clone();
                    let issuer_o = declared_o
                        .and_then(|tx| tx.request().credential_o())
                        .map(|credential| credential.issuer().clone());
                    if signer != owner && Some(&signer) != issuer_o.as_ref() {
                        return Err(Error::IllegalArgument(
                            "revocation signer is neither owner nor issuer".into(),
                        ));
                    }
                }
                _ => {
                    return Err(Error::MalformedIDChainRequest("invalid operation".into()));
                }
            }
        }
        let txid = state.allocate_txid();
        let transaction =
            CredentialTransaction::new(txid, time::OffsetDateTime::now_utc(), request);
        state
            .credential_transaction_m
            .entry(id)
            .or_default()
            .insert(0, transaction);
        Ok(())
    }
}
