//! JWT authentication middleware and extractors.
//!
//! Tokens are minted by the external identity provider and verified here
//! with the shared HS256 secret. A verified token only proves identity; the
//! stored user record (created by `POST /api/auth/session`) carries the role.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{require_admin, Principal};
use crate::db::User;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (identity provider user ID).
    pub sub: String,
    /// Email address.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Expiration timestamp.
    pub exp: u64,
}

impl JwtClaims {
    /// The principal these claims identify.
    pub fn principal(&self) -> Principal {
        Principal::new(&self.sub, &self.email, &self.name)
    }
}

/// Application state for JWT authentication.
#[derive(Clone)]
pub struct JwtState {
    /// Decoding key for JWT verification.
    pub decoding_key: DecodingKey,
    /// Validation settings.
    pub validation: Validation,
}

impl JwtState {
    /// Create a new JWT state from a secret key.
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }
}

fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "token" {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Extractor for a verified identity token.
///
/// Accepts `Authorization: Bearer <jwt>`, or a `token` query parameter so
/// browsers can follow download links.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let header_token = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|t| t.to_string());

            let token = header_token
                .or_else(|| query_token(parts))
                .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

            // Get JWT state from extensions (set by middleware)
            let jwt_state = parts
                .extensions
                .get::<Arc<JwtState>>()
                .ok_or_else(|| ApiError::internal("JWT state not configured"))?;

            let token_data =
                decode::<JwtClaims>(&token, &jwt_state.decoding_key, &jwt_state.validation)
                    .map_err(|e| {
                        tracing::debug!("JWT validation failed: {}", e);
                        ApiError::unauthorized("Invalid or expired token")
                    })?;

            Ok(AuthUser(token_data.claims))
        })
    }
}

/// Extractor for a verified token whose user has opened a session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;

        let user = state
            .identity
            .current_user(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("No session for this user"))?;

        Ok(CurrentUser(user))
    }
}

/// Extractor for a user whose stored role is admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(Some(&user)).map_err(|e| ApiError::forbidden(e.to_string()))?;
        Ok(AdminUser(user))
    }
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_test_token(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset: i64) -> JwtClaims {
        JwtClaims {
            sub: "google-oauth2|123".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as u64,
        }
    }

    #[test]
    fn test_create_and_verify_token() {
        let secret = "test-secret";
        let state = JwtState::new(secret);
        let token = create_test_token(secret, &claims(3600));

        let decoded = decode::<JwtClaims>(&token, &state.decoding_key, &state.validation).unwrap();
        assert_eq!(decoded.claims.sub, "google-oauth2|123");
        assert_eq!(decoded.claims.email, "alice@example.com");

        let principal = decoded.claims.principal();
        assert_eq!(principal.id, "google-oauth2|123");
        assert_eq!(principal.display_name, "Alice");
    }

    #[test]
    fn test_name_claim_optional() {
        let json = r#"{"sub":"1","email":"a@example.com","exp":1}"#;
        let claims: JwtClaims = serde_json::from_str(json).unwrap();
        assert!(claims.name.is_empty());
    }

    #[test]
    fn test_expired_token() {
        let secret = "test-secret";
        let state = JwtState::new(secret);
        let token = create_test_token(secret, &claims(-3600));

        let result = decode::<JwtClaims>(&token, &state.decoding_key, &state.validation);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_secret() {
        let token = create_test_token("secret1", &claims(3600));
        let state = JwtState::new("secret2");

        let result = decode::<JwtClaims>(&token, &state.decoding_key, &state.validation);
        assert!(result.is_err());
    }

    #[test]
    fn test_query_token() {
        let request = Request::builder()
            .uri("/api/documents/1/content?x=1&token=abc%2Edef")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(query_token(&parts).as_deref(), Some("abc.def"));

        let request = Request::builder().uri("/api/documents").body(()).unwrap();
        let (parts, _) = request.into_parts();
        assert!(query_token(&parts).is_none());
    }
}
