use crate::errors::ServiceError;
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by the identity provider's HS256 access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: Option<String>,
    /// Expiration time (unix seconds)
    pub exp: i64,
    /// Audience; the provider issues "authenticated" for signed-in users
    pub aud: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Caller identity derived from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub audience: String,
}

/// Verifies bearer tokens issued by the hosted identity provider.
#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Validate a JWT and extract the caller identity. All decode
    /// failures collapse into a single 401 message so the response does
    /// not reveal why a token was rejected.
    pub fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.audience.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| ServiceError::Unauthorized("Invalid or expired session".to_string()))?
        .claims;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Invalid or expired session".to_string()))?;

        Ok(AuthenticatedUser {
            id,
            email: claims.email,
            full_name: claims.user_metadata.full_name,
        })
    }

    /// Issue a token the way the identity provider would. Used by tests
    /// and local tooling; production tokens come from the provider.
    pub fn issue_token(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        full_name: Option<&str>,
        ttl_secs: i64,
    ) -> Result<String, ServiceError> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(ToString::to_string),
            exp: chrono::Utc::now().timestamp() + ttl_secs,
            aud: self.config.audience.clone(),
            user_metadata: UserMetadata {
                full_name: full_name.map(ToString::to_string),
            },
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("Token creation failed: {}", e)))
    }
}

/// Extractor that authenticates the caller before any business logic
/// runs. Rejections surface as 401 (missing/invalid token) or 500 when no
/// JWT secret is configured.
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_service = state
            .services
            .auth
            .as_ref()
            .ok_or(ServiceError::NotConfigured("Authentication"))?;

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Authorization required".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Authorization required".to_string()))?;

        auth_service.verify_token(token)
    }
}
