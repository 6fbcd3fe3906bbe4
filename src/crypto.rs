use crate::Error;

/// Byte length of a raw Ed25519 verifying key.
pub const PUBLIC_KEY_LENGTH: usize = 32;
/// Byte length of a raw Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Signing capability injected into sealing operations.  The engine never
/// touches private key material directly; a wallet, HSM, or (in tests) a bare
/// `ed25519_dalek::SigningKey` supplies this.
pub trait Signer {
    /// The raw verifying key bytes corresponding to this signer.
    fn verifying_key_bytes(&self) -> Vec<u8>;
    /// Sign the given 32-byte digest, producing a raw signature.
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, Error>;
}

impl Signer for ed25519_dalek::SigningKey {
    fn verifying_key_bytes(&self) -> Vec<u8> {
        self.verifying_key().to_bytes().to_vec()
    }
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, Error> {
        use ed25519_dalek::Signer;
        Ok(self.sign(digest.as_slice()).to_bytes().to_vec())
    }
}

/// Verify a raw signature over a 32-byte digest against raw verifying key
/// bytes.  Returns Ok(false) for a well-formed signature that doesn't verify;
/// Err only for structurally invalid key or signature material.
pub fn verify_signature(
    verifying_key_bytes: &[u8],
    digest: &[u8; 32],
    signature_bytes: &[u8],
) -> Result<bool, Error> {
    let verifying_key_bytes: &[u8; PUBLIC_KEY_LENGTH] = verifying_key_bytes
        .try_into()
        .map_err(|_| Error::InvalidKey("verifying key must be 32 bytes".into()))?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(verifying_key_bytes)
        .map_err(|_| Error::InvalidKey("not a valid Ed25519 verifying key".into()))?;
    let signature_bytes: &[u8; SIGNATURE_LENGTH] = signature_bytes
        .try_into()
        .map_err(|_| Error::InvalidKey("signature must be 64 bytes".into()))?;
    let signature = ed25519_dalek::Signature::from_bytes(signature_bytes);
    use ed25519_dalek::Verifier;
    Ok(verifying_key.verify(digest.as_slice(), &signature).is_ok())
}

/// SHA-256 of the concatenation of the given inputs.
pub fn sha256_digest(input_v: &[&[u8]]) -> [u8; 32] {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::new();
    for input in input_v {
        hasher.update(input);
    }
    hasher.finalize().into()
}

/// Derive the on-chain address for a verifying key: base58 of the first 20
/// bytes of the double SHA-256 of the raw key bytes.  A primitive DID's
/// method-specific id is exactly this address for its default key.
pub fn address_from_key(verifying_key_bytes: &[u8]) -> String {
    let inner = sha256_digest(&[verifying_key_bytes]);
    let outer = sha256_digest(&[inner.as_slice()]);
    bs58::encode(&outer[..20]).into_string()
}

pub fn base58_encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

pub fn base58_decode(s: &str) -> Result<Vec<u8>, Error> {
    bs58::decode(s)
        .into_vec()
        .map_err(|_| Error::InvalidKey("invalid base58 value".into()))
}

pub fn base64_url_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn base64_url_decode(s: &str) -> Result<Vec<u8>, Error> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| Error::IllegalArgument("invalid base64url value".into()))
}
