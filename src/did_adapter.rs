use crate::Error;

/// The transport seam between the resolution protocol and the ledger.
///
/// Implementations push requests to a real node, an HTTP gateway, or (in
/// tests) a purely in-memory simulated chain.  Both calls are synchronous
/// RPC; retry and backoff policy belongs to the adapter, never to the core.
/// Adapters are shared across concurrently-resolving callers, hence the
/// Send + Sync bound.
pub trait DIDAdapter: Send + Sync {
    /// Send a JSON-RPC resolve request and return the raw response bytes.
    fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error>;
    /// Publish a sealed ID chain request payload to the ledger.
    fn create_id_transaction(&self, payload: &str, memo: &str) -> Result<(), Error>;
}
