//! Farmer model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Farmer {
    pub id: Uuid,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub preferred_taluk: Option<String>,
    pub preferred_hobli: Option<String>,
    pub language: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// App language: English or Kannada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Kn,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Kn => "kn",
        }
    }
}

/// Indian mobile number: exactly 10 digits
pub fn validate_phone_number(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_number");
        err.message = Some("Phone number must be 10 digits".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: String,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
    pub name: Option<String>,
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: String,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub preferred_taluk: Option<String>,
    pub preferred_hobli: Option<String>,
    pub language: Option<Language>,
}

/// Public farmer profile
#[derive(Debug, Serialize)]
pub struct FarmerProfile {
    pub id: Uuid,
    pub phone_number: String,
    pub name: Option<String>,
    pub preferred_taluk: Option<String>,
    pub preferred_hobli: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub farmer: FarmerProfile,
}

impl Farmer {
    pub async fn create(
        pool: &PgPool,
        data: &RegisterRequest,
        password_hash: String,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Farmer>(
            r#"
            INSERT INTO farmers (phone_number, password_hash, name, language)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#
        )
        .bind(&data.phone_number)
        .bind(&password_hash)
        .bind(&data.name)
        .bind(data.language.unwrap_or(Language::En).as_str())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_phone(pool: &PgPool, phone_number: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Farmer>("SELECT * FROM farmers WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Farmer>("SELECT * FROM farmers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Farmer>(
            "UPDATE farmers SET last_login = NOW() WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_password(
        pool: &PgPool,
        phone_number: &str,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Farmer>(
            r#"
            UPDATE farmers
            SET password_hash = $1, updated_at = NOW()
            WHERE phone_number = $2
            RETURNING *
            "#
        )
        .bind(password_hash)
        .bind(phone_number)
        .fetch_optional(pool)
        .await
    }

    /// Update only the provided fields
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: &UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Farmer>(
            r#"
            UPDATE farmers
            SET name = COALESCE($1, name),
                preferred_taluk = COALESCE($2, preferred_taluk),
                preferred_hobli = COALESCE($3, preferred_hobli),
                language = COALESCE($4, language),
                updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#
        )
        .bind(&data.name)
        .bind(&data.preferred_taluk)
        .bind(&data.preferred_hobli)
        .bind(data.language.map(|l| l.as_str()))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub fn to_profile(&self) -> FarmerProfile {
        FarmerProfile {
            id: self.id,
            phone_number: self.phone_number.clone(),
            name: self.name.clone(),
            preferred_taluk: self.preferred_taluk.clone(),
            preferred_hobli: self.preferred_hobli.clone(),
            language: self.language.clone(),
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}
