/// bcrypt only reads this many bytes of its input. Anything longer would
/// match every password sharing the same prefix.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a plaintext password with a fresh salt. Callers reject passwords
/// longer than [`MAX_PASSWORD_BYTES`] before getting here.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Check a plaintext password against a stored hash. A malformed hash or an
/// overlong password counts as a mismatch.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}
