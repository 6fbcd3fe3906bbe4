use std::borrow::Cow;

/// The single error type for this crate.  Variants are the error kind; the
/// payload carries human-readable context.  The kinds fall into four groups:
/// structural/malformed (fatal to the object being parsed or built),
/// resolution (fatal to the resolve call; never downgraded to "not found"),
/// precondition violations (reject the offending call, object stays usable),
/// and state violations (fatal to the current call; callers refresh state and
/// retry at a higher level).
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    // Structural/malformed.
    #[error("Malformed DID: {0}")]
    MalformedDID(Cow<'static, str>),
    #[error("Malformed DIDURL: {0}")]
    MalformedDIDURL(Cow<'static, str>),
    #[error("Malformed DID document: {0}")]
    MalformedDocument(Cow<'static, str>),
    #[error("Malformed credential: {0}")]
    MalformedCredential(Cow<'static, str>),
    #[error("Malformed ID chain request: {0}")]
    MalformedIDChainRequest(Cow<'static, str>),
    #[error("Malformed transfer ticket: {0}")]
    MalformedTransferTicket(Cow<'static, str>),
    #[error("Malformed resolve response: {0}")]
    MalformedResolveResponse(Cow<'static, str>),

    // Resolution.
    #[error("DID resolution failure: {0}")]
    DIDResolve(Cow<'static, str>),
    #[error("DID transport failure: {0}")]
    DIDTransport(Cow<'static, str>),
    #[error("Resolver server error {code}: {message}")]
    ServerError { code: i64, message: String },

    // Precondition violations.
    #[error("Invalid key: {0}")]
    InvalidKey(Cow<'static, str>),
    #[error("Invalid expires: {0}")]
    InvalidExpires(Cow<'static, str>),
    #[error("Not a customized DID: {0}")]
    NotCustomizedDID(Cow<'static, str>),
    #[error("Not a controller: {0}")]
    NotController(Cow<'static, str>),
    #[error("No effective controller: {0}")]
    NoEffectiveController(Cow<'static, str>),
    #[error("Illegal argument: {0}")]
    IllegalArgument(Cow<'static, str>),

    // State violations.
    #[error("Already signed: {0}")]
    AlreadySigned(Cow<'static, str>),
    #[error("Already exists: {0}")]
    AlreadyExists(Cow<'static, str>),
    #[error("Not found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("DID deactivated: {0}")]
    DIDDeactivated(Cow<'static, str>),
    #[error("DID expired: {0}")]
    DIDExpired(Cow<'static, str>),
    #[error("DID not genuine: {0}")]
    DIDNotGenuine(Cow<'static, str>),
    #[error("Document not qualified: {0}")]
    NotQualified(Cow<'static, str>),
    #[error("Local copy not up to date with chain: {0}")]
    DIDNotUpToDate(Cow<'static, str>),
}
