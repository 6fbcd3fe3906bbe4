use std::sync::Arc;

use did_idchain::{DIDAdapter, Error};

use crate::MockIDChain;

/// Transport adapter backed by a [MockIDChain].  A dumb pipe: resolve errors
/// come back as JSON-RPC error responses inside the bytes, submission errors
/// as the chain's own rejection.
pub struct MockAdapter {
    chain: Arc<MockIDChain>,
}

impl MockAdapter {
    pub fn new(chain: Arc<MockIDChain>) -> Self {
        Self { chain }
    }
    pub fn chain(&self) -> &Arc<MockIDChain> {
        &self.chain
    }
}

impl DIDAdapter for MockAdapter {
    fn resolve(&self, request_json: &str) -> Result<Vec<u8>, Error> {
        Ok(self.chain.handle_resolve(request_json))
    }
    fn create_id_transaction(&self, payload: &str, _memo: &str) -> Result<(), Error> {
        self.chain.create_id_transaction(payload)
    }
}
