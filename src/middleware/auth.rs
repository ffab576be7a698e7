//! Authentication middleware

use axum::{
    extract::{State, Request},
    middleware::Next,
    response::Response,
    http::{header::AUTHORIZATION, HeaderMap},
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::{AppState, AppError};
use crate::handlers::auth::Claims;

/// Farmer context extracted from JWT
#[derive(Debug, Clone)]
pub struct FarmerContext {
    pub farmer_id: Uuid,
    pub phone_number: String,
}

/// Decode and validate a farmer JWT
pub fn decode_farmer_token(token: &str, secret: &str) -> Result<FarmerContext, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default()
    )?;

    let claims = token_data.claims;
    Ok(FarmerContext {
        farmer_id: Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?,
        phone_number: claims.phone_number,
    })
}

/// Middleware: Require farmer JWT authentication
pub async fn require_farmer_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(req.headers())?;
    let farmer_ctx = decode_farmer_token(&token, &state.config.jwt_secret)?;

    req.extensions_mut().insert(farmer_ctx);

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::Unauthorized),
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for FarmerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions
            .get::<FarmerContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp_offset: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            phone_number: "9876543210".to_string(),
            exp: (now + exp_offset).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(matches!(extract_bearer_token(&headers), Err(AppError::Unauthorized)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_decode_farmer_token() {
        let ctx = decode_farmer_token(&token("secret", Duration::hours(1)), "secret").unwrap();
        assert_eq!(ctx.phone_number, "9876543210");

        assert!(matches!(
            decode_farmer_token(&token("other", Duration::hours(1)), "secret"),
            Err(AppError::TokenInvalid)
        ));
        assert!(matches!(
            decode_farmer_token(&token("secret", Duration::hours(-2)), "secret"),
            Err(AppError::TokenExpired)
        ));
        assert!(decode_farmer_token("not-a-jwt", "secret").is_err());
    }
}
