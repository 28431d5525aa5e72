use bcrypt::{DEFAULT_COST, hash, verify};

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hashed = hash_password("s3cret-pass").unwrap();
        assert_ne!(hashed, "s3cret-pass");
        assert!(verify_password("s3cret-pass", &hashed).unwrap());
        assert!(!verify_password("wrong-pass", &hashed).unwrap());
    }
}
