use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// Player tokens are issued by the dispatcher that runs the bots; this service
// only verifies them.

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // player identity
    pub exp: usize,  // expiry
    pub iat: usize,  // issued at
}

pub async fn extract_user_from_token(token: &str, secret: &str) -> Result<String> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

    Ok(token_data.claims.sub)
}

#[cfg(test)]
pub(crate) fn generate_jwt_token(identity: &str, secret: &str) -> Result<String> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let claims = Claims {
        sub: identity.to_string(),
        exp: (now + Duration::hours(24)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[tokio::test]
    async fn token_round_trips_subject() {
        let token = generate_jwt_token("bot-7", "secret").unwrap();
        assert_eq!(extract_user_from_token(&token, "secret").await.unwrap(), "bot-7");
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let past = Utc::now() - Duration::hours(2);
        let claims = Claims {
            sub: "bot-7".to_string(),
            exp: past.timestamp() as usize,
            iat: (past - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(matches!(
            extract_user_from_token(&token, "secret").await,
            Err(AppError::AuthError(_))
        ));
    }
}
