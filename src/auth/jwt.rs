use crate::types::{AppError, PublicUser, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

/// Arbitrary claim set carried in a token payload.
pub type ClaimsMap = Map<String, Value>;

/// Claim holding the issue time, in epoch seconds.
pub const ISSUED_AT: &str = "iat";
/// Claim holding the expiry time, in epoch seconds.
pub const EXPIRES_AT: &str = "exp";
/// Claim distinguishing access tokens from refresh tokens.
pub const KIND: &str = "kind";
/// Random per-token nonce, so two tokens minted in the same second differ.
pub const TOKEN_ID: &str = "jti";

/// The two token lifetimes the service mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived per-request credential carrying the public identity claims.
    Access,
    /// Long-lived credential carrying only the identity id.
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Signs and verifies compact HS256 session tokens.
///
/// Tokens are three base64url segments (`header.payload.signature`) with the
/// signature computed as HMAC-SHA256 over `header.payload` using the server
/// secret. Verification collapses every failure cause into `None`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenCodec {
    /// Creates a codec.
    ///
    /// # Arguments
    /// * `secret` - HMAC key shared by signing and verification
    /// * `access_ttl` - Access token validity in seconds
    /// * `refresh_ttl` - Refresh token validity in seconds
    pub fn new(secret: &str, access_ttl: i64, refresh_ttl: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> i64 {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> i64 {
        self.refresh_ttl
    }

    /// Signs `claims` with a lifetime of `ttl_seconds` from now.
    ///
    /// Any caller-supplied `iat`/`exp`/`jti` values are replaced.
    pub fn sign(&self, mut claims: ClaimsMap, ttl_seconds: i64) -> Result<String> {
        let issued_at = Utc::now().timestamp();
        claims.insert(
            TOKEN_ID.to_string(),
            Value::from(hex::encode(rand::random::<[u8; 12]>())),
        );
        claims.insert(ISSUED_AT.to_string(), Value::from(issued_at));
        claims.insert(
            EXPIRES_AT.to_string(),
            Value::from(issued_at.saturating_add(ttl_seconds)),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Returns the claims of a well-formed, correctly signed, unexpired token.
    pub fn verify(&self, token: &str) -> Option<ClaimsMap> {
        if token.split('.').count() != 3 {
            return None;
        }

        match decode::<ClaimsMap>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(reason = %e, "token rejected");
                None
            }
        }
    }

    /// Mints an access token bound to the public view of a user.
    pub fn issue_access_token(&self, user: &PublicUser) -> Result<String> {
        let mut claims = ClaimsMap::new();
        claims.insert("id".to_string(), Value::from(user.id));
        claims.insert("email".to_string(), Value::from(user.email.clone()));
        claims.insert("name".to_string(), Value::from(user.name.clone()));
        claims.insert(KIND.to_string(), Value::from(TokenKind::Access.as_str()));

        self.sign(claims, self.access_ttl)
    }

    /// Mints a refresh token carrying only the identity id.
    pub fn issue_refresh_token(&self, user_id: i64) -> Result<String> {
        let mut claims = ClaimsMap::new();
        claims.insert("id".to_string(), Value::from(user_id));
        claims.insert(KIND.to_string(), Value::from(TokenKind::Refresh.as_str()));

        self.sign(claims, self.refresh_ttl)
    }

    /// Verifies `token` and returns its subject id when it is of the expected kind.
    pub fn verify_subject(&self, token: &str, kind: TokenKind) -> Option<i64> {
        let claims = self.verify(token)?;
        if claims.get(KIND).and_then(Value::as_str) != Some(kind.as_str()) {
            return None;
        }
        claims.get("id").and_then(Value::as_i64)
    }
}
