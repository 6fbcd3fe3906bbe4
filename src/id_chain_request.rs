use std::str::FromStr;

use crate::{crypto, public_key::DEFAULT_PUBLIC_KEY_TYPE, Error, DIDURL};

/// The specification string carried by DID chain requests.
pub const DID_SPECIFICATION: &str = "idchain/did/1.0";
/// The specification string carried by credential chain requests.
pub const CREDENTIAL_SPECIFICATION: &str = "idchain/credential/1.0";

/// The operations an ID chain request can carry.  CREATE/UPDATE/TRANSFER/
/// DEACTIVATE act on DIDs, DECLARE/REVOKE on credentials.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IDChainRequestOperation {
    Create,
    Update,
    Transfer,
    Deactivate,
    Declare,
    Revoke,
}

impl IDChainRequestOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            IDChainRequestOperation::Create => "create",
            IDChainRequestOperation::Update => "update",
            IDChainRequestOperation::Transfer => "transfer",
            IDChainRequestOperation::Deactivate => "deactivate",
            IDChainRequestOperation::Declare => "declare",
            IDChainRequestOperation::Revoke => "revoke",
        }
    }
}

impl std::fmt::Display for IDChainRequestOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IDChainRequestOperation {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(IDChainRequestOperation::Create),
            "update" => Ok(IDChainRequestOperation::Update),
            "transfer" => Ok(IDChainRequestOperation::Transfer),
            "deactivate" => Ok(IDChainRequestOperation::Deactivate),
            "declare" => Ok(IDChainRequestOperation::Declare),
            "revoke" => Ok(IDChainRequestOperation::Revoke),
            _ => Err(Error::MalformedIDChainRequest("invalid operation".into())),
        }
    }
}

impl serde::Serialize for IDChainRequestOperation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for IDChainRequestOperation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// The header of an ID chain request.  Field order is the wire order:
/// specification, operation, previousTxid, ticket.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, serde::Deserialize, Eq, PartialEq, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct IDChainHeader {
    pub specification: String,
    pub operation: IDChainRequestOperation,
    /// The previous transaction id of the target DID; UPDATE only.
    #[serde(rename = "previousTxid")]
    pub previous_txid_o: Option<String>,
    /// The base64url-encoded transfer ticket; TRANSFER only.
    #[serde(rename = "ticket")]
    pub ticket_o: Option<String>,
}

impl IDChainHeader {
    pub fn new(specification: &str, operation: IDChainRequestOperation) -> Self {
        Self {
            specification: specification.to_string(),
            operation,
            previous_txid_o: None,
            ticket_o: None,
        }
    }
}

/// The proof of an ID chain request: the key the request was signed with and
/// the signature over the concatenated header fields and payload.
#[derive(Clone, Debug, serde::Deserialize, Eq, PartialEq, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct IDChainProof {
    #[serde(default = "default_proof_type")]
    pub r#type: String,
    #[serde(rename = "verificationMethod")]
    pub verification_method: DIDURL,
    pub signature: String,
}

fn default_proof_type() -> String {
    DEFAULT_PUBLIC_KEY_TYPE.to_string()
}

impl IDChainProof {
    pub fn new(verification_method: DIDURL, signature: String) -> Self {
        Self {
            r#type: default_proof_type(),
            verification_method,
            signature,
        }
    }
}

/// The request signing input digest: SHA-256 over
/// specification ‖ operation ‖ previousTxid-or-empty ‖ ticket-or-empty ‖ payload,
/// where previousTxid participates only for UPDATE and ticket only for
/// TRANSFER.
pub fn signing_digest(header: &IDChainHeader, payload: &str) -> [u8; 32] {
    let previous_txid = match header.operation {
        IDChainRequestOperation::Update => header.previous_txid_o.as_deref().unwrap_or(""),
        _ => "",
    };
    let ticket = match header.operation {
        IDChainRequestOperation::Transfer => header.ticket_o.as_deref().unwrap_or(""),
        _ => "",
    };
    crypto::sha256_digest(&[
        header.specification.as_bytes(),
        header.operation.as_str().as_bytes(),
        previous_txid.as_bytes(),
        ticket.as_bytes(),
        payload.as_bytes(),
    ])
}
