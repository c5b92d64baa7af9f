use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::model::mongo_model::User;
use crate::model::{GenericError, Role};
use crate::web::{ApiError, AppState};

/// Matches the original deployment's bcryptjs work factor.
pub const BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a hex ObjectId string.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, GenericError> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, GenericError> {
    Ok(bcrypt::verify(password, hash)?)
}

pub fn issue_token(
    user: &User,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, GenericError> {
    let claims = Claims {
        sub: user._id.to_hex(),
        email: user.email.clone(),
        role: user.role,
        exp: (Utc::now() + Duration::minutes(ttl_minutes)).timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Request identity decoded from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized: token missing".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized: token missing".to_string()))?;

        let claims = decode_token(token, &state.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(AuthUser {
            id,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Same as [`AuthUser`] but rejects non-admin callers with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin access only".to_string()));
        }
        Ok(AdminUser(user))
    }
}
