use std::str::FromStr;

use crate::{
    crypto,
    id_chain_request::{signing_digest, IDChainHeader, IDChainProof, DID_SPECIFICATION},
    DIDDocument, Error, IDChainRequestOperation, Resolver, TransferTicket, DID, DIDURL,
};

/// A signed DID transaction payload: CREATE, UPDATE, TRANSFER, or DEACTIVATE.
///
/// The payload is the base64url-encoded normalized document JSON, except for
/// DEACTIVATE, whose payload is the bare DID string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DIDRequest {
    header: IDChainHeader,
    payload: String,
    proof: IDChainProof,
    did: DID,
    document_o: Option<DIDDocument>,
}

impl DIDRequest {
    /// Construct and seal a DID CREATE request.
    pub fn create(
        doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        let header = IDChainHeader::new(DID_SPECIFICATION, IDChainRequestOperation::Create);
        Self::seal(header, doc, sign_key, signer)
    }

    /// Construct and seal a DID UPDATE request against the given previous
    /// transaction id.
    pub fn update(
        doc: &DIDDocument,
        previous_txid: &str,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        if previous_txid.is_empty() {
            return Err(Error::IllegalArgument("empty previous txid".into()));
        }
        let mut header = IDChainHeader::new(DID_SPECIFICATION, IDChainRequestOperation::Update);
        header.previous_txid_o = Some(previous_txid.to_string());
        Self::seal(header, doc, sign_key, signer)
    }

    /// Construct and seal a DID TRANSFER request authorized by the given
    /// ticket.
    pub fn transfer(
        doc: &DIDDocument,
        ticket: &TransferTicket,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        let mut header = IDChainHeader::new(DID_SPECIFICATION, IDChainRequestOperation::Transfer);
        header.ticket_o = Some(crypto::base64_url_encode(ticket.to_json()?.as_bytes()));
        Self::seal(header, doc, sign_key, signer)
    }

    /// Construct and seal a DID DEACTIVATE request signed by one of the
    /// document's own authentication keys.
    pub fn deactivate(
        doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        let header = IDChainHeader::new(DID_SPECIFICATION, IDChainRequestOperation::Deactivate);
        let payload = doc.subject().to_string();
        let sign_key = sign_key.qualified_with(doc.subject());
        // Deactivation is stricter than the other operations: a primitive DID
        // signs with its default key, a customized DID with a controller's
        // default key.  Anything else would fail validation on chain.
        if doc.is_customized() {
            let controller_doc = sign_key
                .did_o()
                .and_then(|controller| doc.controller_document(controller))
                .ok_or(Error::InvalidKey(
                    "sign key does not belong to a resolved controller".into(),
                ))?;
            if controller_doc.default_public_key_id_o() != Some(&sign_key) {
                return Err(Error::InvalidKey(
                    "sign key is not the controller's default key".into(),
                ));
            }
        } else if doc.default_public_key_id_o() != Some(&sign_key) {
            return Err(Error::InvalidKey(
                "sign key is not the default key".into(),
            ));
        }
        Self::seal_payload(header, payload, doc, sign_key.clone(), sign_key, signer, doc)
    }

    /// Construct and seal a DID DEACTIVATE request through an authorization
    /// key: `target_sign_key` names an authorization key of the target
    /// document whose controller is the signer DID, and the actual signature
    /// is made with `sign_key`, an authentication key of the signer document
    /// holding the same key material.
    pub fn deactivate_by_authorization(
        target_doc: &DIDDocument,
        target_sign_key: &DIDURL,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        let header = IDChainHeader::new(DID_SPECIFICATION, IDChainRequestOperation::Deactivate);
        let payload = target_doc.subject().to_string();
        let target_sign_key = target_sign_key.qualified_with(target_doc.subject());
        let authorization_key = target_doc
            .authorization_key(&target_sign_key)
            .ok_or(Error::InvalidKey("not an authorization key".into()))?;
        if authorization_key.controller() != signer_doc.subject() {
            return Err(Error::InvalidKey(
                "authorization key is not controlled by the signer".into(),
            ));
        }
        let sign_key = sign_key.qualified_with(signer_doc.subject());
        let authentication_key = signer_doc
            .authentication_key(&sign_key)?
            .ok_or(Error::InvalidKey("not an authentication key".into()))?;
        if authentication_key.public_key_base58() != authorization_key.public_key_base58() {
            return Err(Error::InvalidKey(
                "authorization key does not match the signer's authentication key".into(),
            ));
        }
        Self::seal_payload(
            header,
            payload,
            target_doc,
            target_sign_key,
            sign_key,
            signer,
            signer_doc,
        )
    }

    fn seal(
        header: IDChainHeader,
        doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        let sign_key = sign_key.qualified_with(doc.subject());
        if doc.authentication_key(&sign_key)?.is_none() {
            return Err(Error::InvalidKey("not an authentication key".into()));
        }
        let payload = crypto::base64_url_encode(doc.to_json(true)?.as_bytes());
        Self::seal_payload(header, payload, doc, sign_key.clone(), sign_key, signer, doc)
    }

    /// The innermost sealing step.  `verification_method` goes into the
    /// proof; `actual_sign_key` (an authentication key of `key_doc`) is the
    /// key the signer must hold.  They differ only for authorization-based
    /// deactivation.
    #[allow(clippy::too_many_arguments)]
    fn seal_payload(
        header: IDChainHeader,
        payload: String,
        doc: &DIDDocument,
        verification_method: DIDURL,
        actual_sign_key: DIDURL,
        signer: &dyn crypto::Signer,
        key_doc: &DIDDocument,
    ) -> Result<Self, Error> {
        if payload.is_empty() {
            return Err(Error::MalformedIDChainRequest("missing payload".into()));
        }
        let key = key_doc
            .authentication_key(&actual_sign_key)?
            .ok_or(Error::InvalidKey("not an authentication key".into()))?;
        if key.public_key_bytes()? != signer.verifying_key_bytes() {
            return Err(Error::InvalidKey(
                "signer does not hold the signing key".into(),
            ));
        }
        let is_deactivate = header.operation == IDChainRequestOperation::Deactivate;
        let digest = signing_digest(&header, &payload);
        let signature = crypto::base64_url_encode(&signer.sign_digest(&digest)?);
        Ok(Self {
            header,
            payload,
            proof: IDChainProof::new(verification_method, signature),
            did: doc.subject().clone(),
            document_o: if is_deactivate { None } else { Some(doc.clone()) },
        })
    }

    pub fn header(&self) -> &IDChainHeader {
        &self.header
    }
    pub fn operation(&self) -> IDChainRequestOperation {
        self.header.operation
    }
    pub fn previous_txid_o(&self) -> Option<&str> {
        self.header.previous_txid_o.as_deref()
    }
    /// The transfer ticket carried by a TRANSFER request.
    pub fn transfer_ticket_o(&self) -> Result<Option<TransferTicket>, Error> {
        match &self.header.ticket_o {
            Some(ticket_b64) => {
                let ticket_json = crypto::base64_url_decode(ticket_b64)?;
                let ticket_json = String::from_utf8(ticket_json).map_err(|_| {
                    Error::MalformedIDChainRequest("ticket is not valid UTF-8".into())
                })?;
                Ok(Some(TransferTicket::from_json(&ticket_json)?))
            }
            None => Ok(None),
        }
    }
    pub fn payload(&self) -> &str {
        &self.payload
    }
    pub fn proof(&self) -> &IDChainProof {
        &self.proof
    }
    /// The target DID of this request.
    pub fn did(&self) -> &DID {
        &self.did
    }
    /// The target document; absent for DEACTIVATE.
    pub fn document_o(&self) -> Option<&DIDDocument> {
        self.document_o.as_ref()
    }

    /// Whether the request signature verifies against the signer document.
    ///
    /// The signer document is the embedded payload document where there is
    /// one; only DEACTIVATE (whose payload is a bare DID) resolves.  This is
    /// what lets biography interpretation substitute an embedded document
    /// instead of re-entering resolution.
    pub fn is_valid(&self, resolver: &dyn Resolver) -> Result<bool, Error> {
        let resolved_doc_o = match &self.document_o {
            Some(_) => None,
            None => Some(resolver.resolve_did(&self.did, false)?.ok_or(
                Error::DIDResolve("deactivation target DID not found".into()),
            )?),
        };
        let doc = self
            .document_o
            .as_ref()
            .or(resolved_doc_o.as_ref())
            .expect("programmer error: one of the two sources is always present");
        // Expiration and deactivation are deliberately not checked here; a
        // biography's historical transactions were signed while valid.
        if !doc.is_genuine()? {
            return Ok(false);
        }
        let sign_key = &self.proof.verification_method;
        let key = if self.operation() != IDChainRequestOperation::Deactivate {
            match doc.authentication_key(sign_key)? {
                Some(key) => key,
                None => return Ok(false),
            }
        } else if !doc.is_customized() {
            // The sign key must be the default key or an authorization key.
            if doc.default_public_key_id_o() == Some(sign_key) {
                doc.default_public_key_o()
                    .expect("programmer error: default key id implies default key")
            } else {
                match doc.authorization_key(sign_key) {
                    Some(key) => key,
                    None => return Ok(false),
                }
            }
        } else {
            // The sign key must be a controller's default key.
            let controller_doc = match sign_key
                .did_o()
                .and_then(|controller| doc.controller_document(controller))
            {
                Some(controller_doc) => controller_doc,
                None => return Ok(false),
            };
            match controller_doc.default_public_key_o() {
                Some(key) if key.id() == sign_key => key,
                _ => return Ok(false),
            }
        };
        let digest = signing_digest(&self.header, &self.payload);
        crypto::verify_signature(
            &key.public_key_bytes()?,
            &digest,
            &crypto::base64_url_decode(&self.proof.signature)?,
        )
    }

    /// Serialize to the wire JSON: header, payload, proof.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(&RequestView {
            header: &self.header,
            payload: &self.payload,
            proof: &self.proof,
        })
        .map_err(|_| Error::MalformedIDChainRequest("failed to serialize request".into()))
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(RequestView {
            header: &self.header,
            payload: &self.payload,
            proof: &self.proof,
        })
        .map_err(|_| Error::MalformedIDChainRequest("failed to serialize request".into()))
    }

    /// Parse and sanitize a request from its wire JSON.  The resolver is
    /// needed to sanitize the embedded document's controllers.
    pub fn from_json_value(
        value: serde_json::Value,
        resolver: &dyn Resolver,
    ) -> Result<Self, Error> {
        let raw: RequestRaw = serde_json::from_value(value)
            .map_err(|_| Error::MalformedIDChainRequest("invalid DID request JSON".into()))?;
        Self::sanitize(raw, resolver)
    }

    pub fn from_json(s: &str, resolver: &dyn Resolver) -> Result<Self, Error> {
        let raw: RequestRaw = serde_json::from_str(s)
            .map_err(|_| Error::MalformedIDChainRequest("invalid DID request JSON".into()))?;
        Self::sanitize(raw, resolver)
    }

    /// Validity/normalization pass after deserialization: re-derives the
    /// DID/document from the payload and qualifies the proof's verification
    /// method against the derived DID.
    fn sanitize(raw: RequestRaw, resolver: &dyn Resolver) -> Result<Self, Error> {
        if raw.header.specification != DID_SPECIFICATION {
            return Err(Error::MalformedIDChainRequest(
                "unsupported specification".into(),
            ));
        }
        match raw.header.operation {
            IDChainRequestOperation::Create | IDChainRequestOperation::Deactivate => {}
            IDChainRequestOperation::Update => {
                if raw
                    .header
                    .previous_txid_o
                    .as_deref()
                    .unwrap_or("")
                    .is_empty()
                {
                    return Err(Error::MalformedIDChainRequest(
                        "missing previous txid".into(),
                    ));
                }
            }
            IDChainRequestOperation::Transfer => {
                if raw.header.ticket_o.as_deref().unwrap_or("").is_empty() {
                    return Err(Error::MalformedIDChainRequest("missing ticket".into()));
                }
            }
            _ => {
                return Err(Error::MalformedIDChainRequest("invalid operation".into()));
            }
        }
        if raw.payload.is_empty() {
            return Err(Error::MalformedIDChainRequest("missing payload".into()));
        }
        let (did, document_o) = if raw.header.operation == IDChainRequestOperation::Deactivate {
            (DID::from_str(&raw.payload)?, None)
        } else {
            let doc_json = crypto::base64_url_decode(&raw.payload)
                .map_err(|_| Error::MalformedIDChainRequest("invalid payload".into()))?;
            let doc_json = String::from_utf8(doc_json)
                .map_err(|_| Error::MalformedIDChainRequest("invalid payload".into()))?;
            let doc = DIDDocument::from_json(&doc_json, resolver)?;
            (doc.subject().clone(), Some(doc))
        };
        let mut proof = raw.proof;
        proof.verification_method = proof.verification_method.qualified_with(&did);
        Ok(Self {
            header: raw.header,
            payload: raw.payload,
            proof,
            did,
            document_o,
        })
    }
}

#[derive(serde::Serialize)]
pub(crate) struct RequestView<'a> {
    pub header: &'a IDChainHeader,
    pub payload: &'a str,
    pub proof: &'a IDChainProof,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RequestRaw {
    pub header: IDChainHeader,
    pub payload: String,
    pub proof: IDChainProof,
}
