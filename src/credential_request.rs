use std::str::FromStr;

use crate::{
    crypto,
    did_request::{RequestRaw, RequestView},
    id_chain_request::{signing_digest, IDChainHeader, IDChainProof, CREDENTIAL_SPECIFICATION},
    DIDDocument, Error, IDChainRequestOperation, Resolver, VerifiableCredential, DIDURL,
};

/// A signed credential transaction payload: DECLARE or REVOKE.
///
/// The DECLARE payload is the base64url-encoded normalized credential JSON;
/// the REVOKE payload is the bare credential id string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialRequest {
    header: IDChainHeader,
    payload: String,
    proof: IDChainProof,
    id: DIDURL,
    credential_o: Option<VerifiableCredential>,
}

impl CredentialRequest {
    /// Construct and seal a credential DECLARE request, signed by the
    /// credential owner.
    pub fn declare(
        credential: &VerifiableCredential,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        if credential.id().did()? != signer_doc.subject() {
            return Err(Error::IllegalArgument(
                "a credential is declared by its owner".into(),
            ));
        }
        let header = IDChainHeader::new(CREDENTIAL_SPECIFICATION, IDChainRequestOperation::Declare);
        let payload = crypto::base64_url_encode(credential.to_json(true)?.as_bytes());
        Self::seal(
            header,
            payload,
            credential.id().clone(),
            Some(credential.clone()),
            signer_doc,
            sign_key,
            signer,
        )
    }

    /// Construct and seal a credential REVOKE request, signed by the
    /// credential owner or its issuer.
    pub fn revoke(
        id: &DIDURL,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        if !id.is_qualified() {
            return Err(Error::IllegalArgument(
                "credential id must be qualified".into(),
            ));
        }
        let header = IDChainHeader::new(CREDENTIAL_SPECIFICATION, IDChainRequestOperation::Revoke);
        let payload = id.to_string();
        Self::seal(header, payload, id.clone(), None, signer_doc, sign_key, signer)
    }

    fn seal(
        header: IDChainHeader,
        payload: String,
        id: DIDURL,
        credential_o: Option<VerifiableCredential>,
        signer_doc: &DIDDocument,
        sign_key: &DIDURL,
        signer: &dyn crypto::Signer,
    ) -> Result<Self, Error> {
        let sign_key = sign_key.qualified_with(signer_doc.subject());
        let key = signer_doc
            .authentication_key(&sign_key)?
            .ok_or(Error::InvalidKey("not an authentication key".into()))?;
        if key.public_key_bytes()? != signer.verifying_key_bytes() {
            return Err(Error::InvalidKey(
                "signer does not hold the signing key".into(),
            ));
        }
        let digest = signing_digest(&header, &payload);
        let signature = crypto::base64_url_encode(&signer.sign_digest(&digest)?);
        Ok(Self {
            header,
            payload,
            proof: IDChainProof::new(sign_key, signature),
            id,
            credential_o,
        })
    }

    pub fn header(&self) -> &IDChainHeader {
        &self.header
    }
    pub fn operation(&self) -> IDChainRequestOperation {
        self.header.operation
    }
    pub fn payload(&self) -> &str {
        &self.payload
    }
    pub fn proof(&self) -> &IDChainProof {
        &self.proof
    }
    /// The target credential id of this request.
    pub fn id(&self) -> &DIDURL {
        &self.id
    }
    /// The declared credential; absent for REVOKE.
    pub fn credential_o(&self) -> Option<&VerifiableCredential> {
        self.credential_o.as_ref()
    }

    /// Whether the request signature verifies.  For a DECLARE the signer
    /// document is the credential owner's (whose authentication keys include
    /// its controllers' for a customized owner); for a REVOKE it is the
    /// document of whichever party signed, owner or issuer.
    pub fn is_valid(&self, resolver: &dyn Resolver) -> Result<bool, Error> {
        let sign_key = &self.proof.verification_method;
        let signer_did = if self.operation() == IDChainRequestOperation::Declare {
            self.id.did()?
        } else {
            sign_key.did()?
        };
        let signer_doc = resolver
            .resolve_did(signer_did, false)?
            .ok_or(Error::DIDResolve("request signer DID not found".into()))?;
        if !signer_doc.is_genuine()? {
            return Ok(false);
        }
        let key = match signer_doc.authentication_key(sign_key)? {
            Some(key) => key,
            None => return Ok(false),
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

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, Error> {
        let raw: RequestRaw = serde_json::from_value(value).map_err(|_| {
            Error::MalformedIDChainRequest("invalid credential request JSON".into())
        })?;
        Self::sanitize(raw)
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        let raw: RequestRaw = serde_json::from_str(s).map_err(|_| {
            Error::MalformedIDChainRequest("invalid credential request JSON".into())
        })?;
        Self::sanitize(raw)
    }

    /// Validity/normalization pass after deserialization: re-derives the
    /// credential (or its id) from the payload and qualifies the proof's
    /// verification method.
    fn sanitize(raw: RequestRaw) -> Result<Self, Error> {
        if raw.header.specification != CREDENTIAL_SPECIFICATION {
            return Err(Error::MalformedIDChainRequest(
                "unsupported specification".into(),
            ));
        }
        if raw.payload.is_empty() {
            return Err(Error::MalformedIDChainRequest("missing payload".into()));
        }
        let (id, credential_o) = match raw.header.operation {
            IDChainRequestOperation::Declare => {
                let vc_json = crypto::base64_url_decode(&raw.payload)
                    .map_err(|_| Error::MalformedIDChainRequest("invalid payload".into()))?;
                let vc_json = String::from_utf8(vc_json)
                    .map_err(|_| Error::MalformedIDChainRequest("invalid payload".into()))?;
                let credential = VerifiableCredential::from_json(&vc_json)?;
                (credential.id().clone(), Some(credential))
            }
            IDChainRequestOperation::Revoke => {
                let id = DIDURL::from_str(&raw.payload)?;
                if !id.is_qualified() {
                    return Err(Error::MalformedIDChainRequest(
                        "credential id must be qualified".into(),
                    ));
                }
                (id, None)
            }
            _ => {
                return Err(Error::MalformedIDChainRequest("invalid operation".into()));
            }
        };
        let mut proof = raw.proof;
        proof.verification_method = proof
            .verification_method
            .qualified_with(id.did()?);
        Ok(Self {
            header: raw.header,
            payload: raw.payload,
            proof,
            id,
            credential_o,
        })
    }
}
