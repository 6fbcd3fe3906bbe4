use crate::{
    canonical, crypto,
    proof::{proof_ordering, DocumentProofRaw, DocumentProofView},
    DIDDocument, DocumentProof, Error, Resolver, DID,
};

/// A signed authorization permitting ownership transfer of a customized DID
/// to a new controller.  Sealed by the current controller(s) against the
/// DID's latest on-chain transaction, and carried (base64url-encoded) in the
/// header of a TRANSFER request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferTicket {
    id: DID,
    to: DID,
    txid: String,
    proof_v: Vec<DocumentProof>,
}

impl TransferTicket {
    /// Start a ticket transferring the given (resolved, published) customized
    /// document to `to`.  The ticket pins the document's current transaction
    /// id, so the target must carry resolution metadata.
    pub fn new(target_doc: &DIDDocument, to: DID) -> Result<Self, Error> {
        if !target_doc.is_customized() {
            return Err(Error::NotCustomizedDID(target_doc.subject().to_string().into()));
        }
        let txid = target_doc
            .metadata()
            .transaction_id_o
            .clone()
            .ok_or(Error::DIDNotUpToDate(
                "target document carries no transaction id; resolve it first".into(),
            ))?;
        Ok(Self {
            id: target_doc.subject().clone(),
            to,
            txid,
            proof_v: Vec::new(),
        })
    }

    /// The customized DID being transferred.
    pub fn id(&self) -> &DID {
        &self.id
    }
    /// The DID receiving ownership.
    pub fn to(&self) -> &DID {
        &self.to
    }
    /// The latest transaction id of the DID at sealing time.
    pub fn txid(&self) -> &str {
        &self.txid
    }
    pub fn proofs(&self) -> &[DocumentProof] {
        &self.proof_v
    }

    fn signing_digest(&self) -> Result<[u8; 32], Error> {
        let view = self.to_view(true);
        let bytes = serde_json::to_vec(&view).map_err(|_| {
            Error::MalformedTransferTicket("failed to serialize ticket to canonical JSON".into())
        })?;
        Ok(crypto::sha256_digest(&[&bytes]))
    }

    /// Attach one controller's signature.  Sealed repeatedly by different
    /// controllers until qualified against the document's multisig.
    pub fn seal(
        &mut self,
        controller_doc: &DIDDocument,
        signer: &dyn crypto::Signer,
    ) -> Result<(), Error> {
        let controller = controller_doc.subject().clone();
        if self
            .proof_v
            .iter()
            .any(|proof| proof.signer().ok() == Some(&controller))
        {
            return Err(Error::AlreadySigned(controller.to_string().into()));
        }
        let default_key = controller_doc
            .default_public_key_o()
            .ok_or(Error::MalformedDocument(
                "controller document missing default public key".into(),
            ))?;
        if default_key.public_key_bytes()? != signer.verifying_key_bytes() {
            return Err(Error::InvalidKey(
                "signer does not hold the controller's default key".into(),
            ));
        }
        let digest = self.signing_digest()?;
        let signature = signer.sign_digest(&digest)?;
        self.proof_v.push(DocumentProof::new(
            default_key.key_type().to_string(),
            canonical::now_utc_seconds(),
            default_key.id().clone(),
            crypto::base64_url_encode(&signature),
        ));
        self.proof_v.sort_by(proof_ordering);
        Ok(())
    }

    /// Whether the ticket is genuinely authorized: resolves the transferred
    /// DID, requires enough controller signatures to satisfy its multisig,
    /// and verifies each one.
    pub fn is_valid(&self, resolver: &dyn Resolver) -> Result<bool, Error> {
        let target_doc = resolver
            .resolve_did(&self.id, false)?
            .ok_or(Error::DIDResolve("transferred DID not found".into()))?;
        if !target_doc.is_customized() {
            return Ok(false);
        }
        if self.proof_v.len() < target_doc.required_signature_count() {
            return Ok(false);
        }
        let digest = self.signing_digest()?;
        let mut signer_v: Vec<&DID> = Vec::new();
        for proof in &self.proof_v {
            let signer = proof.signer()?;
            if signer_v.contains(&signer) {
                return Ok(false);
            }
            if !target_doc.has_controller(signer) {
                return Ok(false);
            }
            let controller_doc = target_doc
                .controller_document(signer)
                .ok_or(Error::DIDResolve("controller document not resolved".into()))?;
            if !controller_doc.is_genuine()? {
                return Ok(false);
            }
            let default_key = controller_doc
                .default_public_key_o()
                .ok_or(Error::MalformedDocument(
                    "controller document missing default public key".into(),
                ))?;
            if proof.creator() != default_key.id() {
                return Ok(false);
            }
            if !crypto::verify_signature(
                &default_key.public_key_bytes()?,
                &digest,
                &proof.signature_bytes()?,
            )? {
                return Ok(false);
            }
            signer_v.push(signer);
        }
        Ok(true)
    }

    /// The canonical JSON: id, to, txid, proof.
    pub fn to_json(&self) -> Result<String, Error> {
        let view = self.to_view(false);
        serde_json::to_string(&view).map_err(|_| {
            Error::MalformedTransferTicket("failed to serialize ticket to canonical JSON".into())
        })
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        let raw: TicketRaw = serde_json::from_str(s)
            .map_err(|_| Error::MalformedTransferTicket("invalid ticket JSON".into()))?;
        let proof_raw_v = raw
            .proof
            .map(canonical::OneOrManyRaw::into_vec)
            .unwrap_or_default();
        let mut proof_v = Vec::with_capacity(proof_raw_v.len());
        for proof_raw in proof_raw_v {
            let pending = proof_raw.into_pending()?;
            let creator = pending.creator_o.clone().ok_or(Error::MalformedTransferTicket(
                "ticket proof missing creator".into(),
            ))?;
            if !creator.is_qualified() {
                return Err(Error::MalformedTransferTicket(
                    "ticket proof creator is not qualified".into(),
                ));
            }
            proof_v.push(pending.into_proof(creator));
        }
        proof_v.sort_by(proof_ordering);
        Ok(Self {
            id: raw.id,
            to: raw.to,
            txid: raw.txid,
            proof_v,
        })
    }

    fn to_view(&self, for_sign: bool) -> TicketView {
        TicketView {
            id: self.id.to_string(),
            to: self.to.to_string(),
            txid: self.txid.clone(),
            proof: if for_sign {
                None
            } else {
                canonical::OneOrMany::from_vec(
                    self.proof_v
                        .iter()
                        .map(|proof| proof.to_view(&self.id, None, true))
                        .collect(),
                )
            },
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(serde::Serialize)]
struct TicketView {
    id: String,
    to: String,
    txid: String,
    proof: Option<canonical::OneOrMany<DocumentProofView>>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TicketRaw {
    id: DID,
    to: DID,
    txid: String,
    #[serde(default)]
    proof: Option<canonical::OneOrManyRaw<DocumentProofRaw>>,
}
