use crate::{DIDDocument, Error, DID};

/// The resolution capability the document model depends on.
///
/// Document sanitization and verification need to fetch controller documents;
/// chain request validation needs to fetch signer documents.  Both take a
/// `&dyn Resolver` explicitly instead of consulting any global state, so a
/// test can hand in a map-backed mock and the production path hands in the
/// backend (which implements this trait).
///
/// `Ok(None)` means confirmed absence; transport or interpretation failures
/// must surface as `Err`, never as `Ok(None)`.
pub trait Resolver {
    fn resolve_did(&self, did: &DID, force: bool) -> Result<Option<DIDDocument>, Error>;
}
