use crate::canonical;

/// Chain-derived metadata attached to a resolved DID document.  Not part of
/// the canonical (signed) form; purely informational output of resolution.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, serde::Deserialize, Eq, PartialEq, serde::Serialize)]
pub struct DIDMetadata {
    /// The id of the transaction the current document state came from.
    #[serde(rename = "txid")]
    pub transaction_id_o: Option<String>,
    /// The document proof signature as of that transaction.
    #[serde(rename = "signature")]
    pub signature_o: Option<String>,
    /// When the transaction was recorded on the ledger.
    #[serde(rename = "published", with = "time::serde::rfc3339::option")]
    pub published_o: Option<time::OffsetDateTime>,
    /// True once the DID has been deactivated on the ledger.
    #[serde(rename = "deactivated", default, skip_serializing_if = "std::ops::Not::not")]
    pub deactivated: bool,
    /// The proof signature of the previous published state, recorded locally
    /// at publish time; publish reconciliation compares it against the
    /// resolved chain state.
    #[serde(rename = "previousSignature")]
    pub previous_signature_o: Option<String>,
}

impl DIDMetadata {
    pub(crate) fn set_published(&mut self, published: time::OffsetDateTime) {
        self.published_o = Some(canonical::truncated_to_seconds(published));
    }
}

/// Chain-derived metadata attached to a resolved credential.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, serde::Deserialize, Eq, PartialEq, serde::Serialize)]
pub struct CredentialMetadata {
    #[serde(rename = "txid")]
    pub transaction_id_o: Option<String>,
    #[serde(rename = "published", with = "time::serde::rfc3339::option")]
    pub published_o: Option<time::OffsetDateTime>,
    /// True once the credential has been revoked on the ledger.
    #[serde(rename = "revoked", default, skip_serializing_if = "std::ops::Not::not")]
    pub revoked: bool,
}

impl CredentialMetadata {
    pub(crate) fn set_published(&mut self, published: time::OffsetDateTime) {
        self.published_o = Some(canonical::truncated_to_seconds(published));
    }
}
