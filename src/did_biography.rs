use crate::{canonical, DIDRequest, Error, Resolver, DID};

/// The status of a DID biography, as carried on the wire (integer codes).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DIDBiographyStatus {
    Valid = 0,
    Expired = 1,
    Deactivated = 2,
    NotFound = 3,
}

impl DIDBiographyStatus {
    pub fn code(&self) -> u8 {
        *self as u8
    }
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(DIDBiographyStatus::Valid),
            1 => Ok(DIDBiographyStatus::Expired),
            2 => Ok(DIDBiographyStatus::Deactivated),
            3 => Ok(DIDBiographyStatus::NotFound),
            _ => Err(Error::MalformedResolveResponse(
                "invalid DID biography status".into(),
            )),
        }
    }
}

impl std::fmt::Display for DIDBiographyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            DIDBiographyStatus::Valid => "valid",
            DIDBiographyStatus::Expired => "expired",
            DIDBiographyStatus::Deactivated => "deactivated",
            DIDBiographyStatus::NotFound => "not_found",
        };
        f.write_str(s)
    }
}

impl serde::Serialize for DIDBiographyStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for DIDBiographyStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code).map_err(serde::de::Error::custom)
    }
}

/// One ledger transaction of a DID's biography.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DIDTransaction {
    txid: String,
    timestamp: time::OffsetDateTime,
    request: DIDRequest,
}

impl DIDTransaction {
    pub fn new(txid: String, timestamp: time::OffsetDateTime, request: DIDRequest) -> Self {
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
    pub fn request(&self) -> &DIDRequest {
        &self.request
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::json!({
            "txid": self.txid,
            "timestamp": canonical::format_datetime(self.timestamp),
            "operation": self.request.to_json_value()?,
        }))
    }

    pub fn from_json_value(
        value: serde_json::Value,
        resolver: &dyn Resolver,
    ) -> Result<Self, Error> {
        let raw: TransactionRaw = serde_json::from_value(value)
            .map_err(|_| Error::MalformedResolveResponse("invalid transaction".into()))?;
        let timestamp = canonical::parse_datetime(&raw.timestamp)
            .map_err(|_| Error::MalformedResolveResponse("invalid transaction timestamp".into()))?;
        let request = DIDRequest::from_json_value(raw.operation, resolver)
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

/// The ordered transaction history for a DID (most recent first) plus its
/// derived status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DIDBiography {
    did: DID,
    status: DIDBiographyStatus,
    transaction_v: Vec<DIDTransaction>,
}

impl DIDBiography {
    pub fn new(did: DID, status: DIDBiographyStatus, transaction_v: Vec<DIDTransaction>) -> Self {
        Self {
            did,
            status,
            transaction_v,
        }
    }
    pub fn did(&self) -> &DID {
        &self.did
    }
    pub fn status(&self) -> DIDBiographyStatus {
        self.status
    }
    pub fn transaction_count(&self) -> usize {
        self.transaction_v.len()
    }
    /// The transaction at the given index; 0 is the most recent.
    pub fn transaction(&self, index: usize) -> Option<&DIDTransaction> {
        self.transaction_v.get(index)
    }
    pub fn transactions(&self) -> &[DIDTransaction] {
        &self.transaction_v
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, Error> {
        let transaction_v: Vec<serde_json::Value> = self
            .transaction_v
            .iter()
            .map(DIDTransaction::to_json_value)
            .collect::<Result<_, _>>()?;
        Ok(serde_json::json!({
            "did": self.did.to_string(),
            "status": self.status.code(),
            "transaction": transaction_v,
        }))
    }

    /// Parse a biography from a resolve result payload, enforcing the shape
    /// rule that only NOT_FOUND may (and must) have no transactions.
    pub fn from_json_value(
        value: serde_json::Value,
        resolver: &dyn Resolver,
    ) -> Result<Self, Error> {
        let raw: BiographyRaw = serde_json::from_value(value)
            .map_err(|_| Error::MalformedResolveResponse("invalid DID biography".into()))?;
        let status = DIDBiographyStatus::from_code(raw.status)?;
        let transaction_v: Vec<DIDTransaction> = raw
            .transaction
            .into_iter()
            .map(|tx| DIDTransaction::from_json_value(tx, resolver))
            .collect::<Result<_, _>>()?;
        if status == DIDBiographyStatus::NotFound {
            if !transaction_v.is_empty() {
                return Err(Error::MalformedResolveResponse(
                    "should not include transaction".into(),
                ));
            }
        } else if transaction_v.is_empty() {
            return Err(Error::MalformedResolveResponse("missing transaction".into()));
        }
        Ok(Self {
            did: raw.did,
            status,
            transaction_v,
        })
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BiographyRaw {
    did: DID,
    status: u8,
    #[serde(default)]
    transaction: Vec<serde_json::Value>,
}
