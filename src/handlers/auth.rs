//! Authentication handlers

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use jsonwebtoken::{encode, Header, EncodingKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use chrono::{Utc, Duration};
use validator::Validate;

use crate::{AppState, AppError, AppResult};
use crate::middleware::auth::{decode_farmer_token, extract_bearer_token};
use crate::models::{Farmer, ForgotPasswordRequest, LoginRequest, RegisterRequest, TokenResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // Farmer ID
    pub phone_number: String,
    pub exp: usize,           // Expiration timestamp
    pub iat: usize,           // Issued at
}

#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    pub phone_number: String,
    pub message: &'static str,
}

/// Register a new farmer
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    req.validate()?;

    if Farmer::find_by_phone(&state.pool, &req.phone_number).await?.is_some() {
        return Err(AppError::AlreadyExists("Phone number already registered".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let farmer = Farmer::create(&state.pool, &req, password_hash).await?;

    tracing::info!("New farmer registered: {}", farmer.id);

    let access_token = generate_jwt(&farmer, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;
    Ok((StatusCode::CREATED, Json(TokenResponse {
        access_token,
        token_type: "bearer",
        farmer: farmer.to_profile(),
    })))
}

/// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let farmer = Farmer::find_by_phone(&state.pool, &req.phone_number)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    verify_password(&req.password, &farmer.password_hash)?;

    let farmer = Farmer::update_last_login(&state.pool, farmer.id)
        .await?
        .unwrap_or(farmer);

    let access_token = generate_jwt(&farmer, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        farmer: farmer.to_profile(),
    }))
}

/// Tokens are stateless; the client just drops its copy
pub async fn logout() -> Json<Value> {
    Json(json!({ "message": "Successfully logged out" }))
}

pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<VerifyTokenResponse>> {
    let token = extract_bearer_token(&headers)?;
    let ctx = decode_farmer_token(&token, &state.config.jwt_secret)?;

    Ok(Json(VerifyTokenResponse {
        valid: true,
        phone_number: ctx.phone_number,
        message: "Token is valid",
    }))
}

/// Reset a password by phone number
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<Value>> {
    req.validate()?;

    let password_hash = hash_password(&req.new_password)?;
    let farmer = Farmer::update_password(&state.pool, &req.phone_number, &password_hash)
        .await?
        .ok_or_else(|| AppError::NotFound("Phone number not registered".to_string()))?;

    tracing::info!("Password reset for farmer {}", farmer.id);

    Ok(Json(json!({
        "message": "Password reset successfully",
        "phone_number": farmer.phone_number,
    })))
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(e.to_string()))
}

fn verify_password(password: &str, password_hash: &str) -> AppResult<()> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::InternalError("Invalid password hash".to_string()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)
}

/// Generate JWT token
fn generate_jwt(farmer: &Farmer, secret: &str, expiration_hours: u64) -> AppResult<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours as i64);

    let claims = Claims {
        sub: farmer.id.to_string(),
        phone_number: farmer.phone_number.clone(),
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes())
    ).map_err(|e| AppError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn farmer() -> Farmer {
        let now = Utc::now();
        Farmer {
            id: Uuid::new_v4(),
            phone_number: "9876543210".to_string(),
            password_hash: String::new(),
            name: None,
            preferred_taluk: None,
            preferred_hobli: None,
            language: "en".to_string(),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("mango-season").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("mango-season", &hash).is_ok());
        assert!(matches!(verify_password("wrong", &hash), Err(AppError::InvalidCredentials)));
    }

    #[test]
    fn test_logout_message() {
        let Json(body) = tokio_test::block_on(logout());
        assert_eq!(body["message"], "Successfully logged out");
    }

    #[test]
    fn test_generate_jwt_claims() {
        let farmer = farmer();
        let token = generate_jwt(&farmer, "secret", 168).unwrap();

        let ctx = decode_farmer_token(&token, "secret").unwrap();
        assert_eq!(ctx.farmer_id, farmer.id);
        assert_eq!(ctx.phone_number, "9876543210");
    }
}
