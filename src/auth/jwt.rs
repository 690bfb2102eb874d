use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::WorkerClaims;

/// Validates an HS256 worker token and returns the worker id it was issued for.
pub fn validate_worker_token(token: &str, secret: &str) -> Result<i32, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<WorkerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("JWT validation failed: {}", e))?;

    token_data.claims.worker_id()
}

/// Issues a worker token. Used by operators' tooling and the tests.
pub fn issue_worker_token(worker_id: i32, secret: &str, ttl_secs: i64) -> Result<String, String> {
    let now = chrono::Utc::now().timestamp();
    let claims = WorkerClaims {
        sub: worker_id.to_string(),
        exp: now + ttl_secs,
        iat: Some(now),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign worker token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_for_testing_purposes";

    #[test]
    fn test_issue_and_validate_token() {
        let token = issue_worker_token(42, SECRET, 300).unwrap();
        assert_eq!(validate_worker_token(&token, SECRET).unwrap(), 42);
    }

    #[test]
    fn test_token_with_wrong_secret() {
        let token = issue_worker_token(42, SECRET, 300).unwrap();
        assert!(validate_worker_token(&token, "wrong_secret_key").is_err());
    }

    #[test]
    fn test_expired_token() {
        // Beyond the default 60 second leeway.
        let token = issue_worker_token(42, SECRET, -600).unwrap();
        assert!(validate_worker_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = WorkerClaims {
            sub: "user_abc".to_string(),
            exp: chrono::Utc::now().timestamp() + 300,
            iat: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(validate_worker_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_invalid_token_format() {
        assert!(validate_worker_token("invalid_token", SECRET).is_err());
    }
}
