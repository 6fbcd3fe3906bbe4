use crate::{canonical, CredentialRequest, Error, DIDURL};

/// The status of a credential biography, as carried on the wire.  The codes
/// share the DID biography numbering; credentials have no expired or
/// deactivated state of their own.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CredentialBiographyStatus {
    Valid = 0,
    Revoked = 2,
    NotFound = 3,
}

impl CredentialBiographyStatus {
    pub fn code(&self) -> u8 {
        *self as u8
    }
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(CredentialBiographyStatus::Valid),
            2 => Ok(CredentialBiographyStatus::Revoked),
            3 => Ok(CredentialBiographyStatus::NotFound),
            _ => Err(Error::MalformedResolveResponse(
                "invalid credential biography status".into(),
            )),
        }
    }
}

impl std::fmt::Display for CredentialBiographyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            CredentialBiographyStatus::Valid => "valid",
            CredentialBiographyStatus::Revoked => "revoked",
            CredentialBiographyStatus::NotFound => "not_found",
        };
        f.write_str(s)
    }
}

/// One ledger transaction of a credential's biography.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialTransaction {
    txid: String,
    timestamp: time::OffsetDateTime,
    request: CredentialRequest,
}

impl CredentialTransaction {
    pub fn new(txid: String, timestamp: time::OffsetDateTime, request: CredentialRequest) -> Self {
        Self {
            txid,
            timestamp: canonical::truncated_to_seconds(timestamp),
            request,
        }
    }
    pub fn txid(&self) -> &str {
        &self.txid
    }
    pub fn timestamp(&self) -> time::OffsetDateTime {
        self.timestamp
    }
    pub fn request(&self) -> &CredentialRequest {
        &self.request
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::json!({
            "txid": self.txid,
            "timestamp": canonical::format_datetime(self.timestamp),
            "operation": self.request.to_json_value()?,
        }))
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, Error> {
        let raw: TransactionRaw = serde_json::from_value(value)
            .map_err(|_| Error::MalformedResolveResponse("invalid transaction".into()))?;
        let timestamp = canonical::parse_datetime(&raw.timestamp)
            .map_err(|_| Error::MalformedResolveResponse("invalid transaction timestamp".into()))?;
        let request = CredentialRequest::from_json_value(raw.operation)
            .map_err(|_| Error::MalformedResolveResponse("invalid transaction".into()))?;
        Ok(Self {
            txid: raw.txid,
            timestamp,
            request,
        })
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TransactionRaw {
    txid: String,
    timestamp: String,
    operation: serde_json::Value,
}

/// The ordered transaction history for a credential (most recent first) plus
/// its derived status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CredentialBiography {
    id: DIDURL,
    status: CredentialBiographyStatus,
    transaction_v: Vec<CredentialTransaction>,
}

impl CredentialBiography {
    pub fn new(
        id: DIDURL,
        status: CredentialBiographyStatus,
        transaction_v: Vec<CredentialTransaction>,
    ) -> Self {
        Self {
            id,
            status,
            transaction_v,
        }
    }
    pub fn id(&self) -> &DIDURL {
        &self.id
    }
    pub fn status(&self) -> CredentialBiographyStatus {
        self.status
    }
    pub fn transaction_count(&self) -> usize {
        self.transaction_v.len()
    }
    /// The transaction at the given index; 0 is the most recent.
    pub fn transaction(&self, index: usize) -> Option<&CredentialTransaction> {
        self.transaction_v.get(index)
    }
    pub fn transactions(&self) -> &[CredentialTransaction] {
        &self.transaction_v
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        let transaction_v: Vec<serde_json::Value> = self
            .transaction_v
            .iter()
            .map(CredentialTransaction::to_json_value)
            .collect::<Result<_, _>>()?;
        Ok(serde_json::json!({
            "id": self.id.to_string(),
            "status": self.status.code(),
            "transaction": transaction_v,
        }))
    }

    /// Parse a biography from a resolve result payload, enforcing the shape
    /// rule that only NOT_FOUND may (and must) have no transactions.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, Error> {
        let raw: BiographyRaw = serde_json::from_value(value)
            .map_err(|_| Error::MalformedResolveResponse("invalid credential biography".into()))?;
        let status = CredentialBiographyStatus::from_code(raw.status)?;
        let transaction_v: Vec<CredentialTransaction> = raw
            .transaction
            .into_iter()
            .map(CredentialTransaction::from_json_value)
            .collect::<Result<_, _>>()?;
        if status == CredentialBiographyStatus::NotFound {
            if !transaction_v.is_empty() {
                return Err(Error::MalformedResolveResponse(
                    "should not include transaction".into(),
                ));
            }
        } else if transaction_v.is_empty() {
            return Err(Error::MalformedResolveResponse("missing transaction".into()));
        }
        Ok(Self {
            id: raw.id,
            status,
            transaction_v,
        })
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BiographyRaw {
    id: DIDURL,
    status: u8,
    #[serde(default)]
    transaction: Vec<serde_json::Value>,
}

/// The result payload of a `listcredentials` resolve: the declared credential
/// ids owned by a DID.
#[derive(Clone, Debug, serde::Deserialize, Eq, PartialEq, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialList {
    pub did: crate::DID,
    #[serde(default)]
    pub credentials: Vec<DIDURL>,
}
