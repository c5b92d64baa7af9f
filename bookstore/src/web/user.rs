use std::path::Path;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use mongodb::bson::DateTime as BsonDateTime;
use mongodb::bson::oid::ObjectId;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::auth::{AuthUser, hash_password, issue_token, verify_password};
use crate::email::RESET_TOKEN_TTL_MINUTES;
use crate::model::Role;
use crate::model::mongo_model::User;
use crate::storage::is_duplicate_key_error;
use crate::web::{ApiError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/me", get(get_profile).put(update_profile))
        .route("/avatar", post(upload_avatar))
}

/// User as exposed over the API: everything except the hash and the reset
/// token fields.
#[derive(Debug, Clone, Serialize)]
pub struct SafeUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: String,
}

impl From<&User> for SafeUser {
    fn from(user: &User) -> Self {
        SafeUser {
            id: user._id.to_hex(),
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar_url: user.avatar_url.clone(),
        }
    }
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

const MIN_PASSWORD_LEN: usize = 6;

// Role is deliberately absent here: it always defaults to `user`.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (Some(fullname), Some(email), Some(password)) = (body.fullname, body.email, body.password)
    else {
        return Err(ApiError::Validation(
            "fullname, email and password are required".to_string(),
        ));
    };
    let fullname = fullname.trim().to_string();
    let email = email.trim().to_lowercase();
    if fullname.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "fullname, email and password are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if state.users.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Validation("User already exists".to_string()));
    }

    let now = BsonDateTime::now();
    let user = User {
        _id: ObjectId::new(),
        fullname,
        email,
        password: hash_password(&password)?,
        role: Role::User,
        avatar_url: String::new(),
        reset_password_token: None,
        reset_password_expires: None,
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = state.users.insert_user(&user).await {
        // The unique index closes the lookup/insert race.
        if is_duplicate_key_error(&err) {
            return Err(ApiError::Validation("User already exists".to_string()));
        }
        return Err(err.into());
    }
    tracing::info!(user_id = %user._id, "user signed up");

    let token = issue_token(&user, &state.jwt_secret, state.token_ttl_minutes)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": SafeUser::from(&user),
            "token": token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(ApiError::Validation(
            "Email and password required".to_string(),
        ));
    };

    // Missing account and wrong password answer identically.
    let invalid = || ApiError::Validation("Invalid username or password".to_string());

    let user = state
        .users
        .find_user_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&password, &user.password)? {
        return Err(invalid());
    }

    let token = issue_token(&user, &state.jwt_secret, state.token_ttl_minutes)?;
    Ok(Json(json!({
        "message": "Login successful",
        "user": SafeUser::from(&user),
        "token": token,
    })))
}

pub async fn get_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SafeUser>, ApiError> {
    let user = state
        .users
        .find_user_by_id(auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(SafeUser::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub fullname: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let fullname = body
        .fullname
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::Validation("fullname is required".to_string()))?;

    let updated = state
        .users
        .update_fullname(auth.id, &fullname)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(json!({
        "message": "Profile updated",
        "user": SafeUser::from(&updated),
    })))
}

pub async fn upload_avatar(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut stored: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::Validation(
                "Only image files are allowed".to_string(),
            ));
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let ext = file_name
            .rfind('.')
            .map(|dot| file_name[dot..].to_string())
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::Validation(err.to_string()))?;

        let name = format!("avatar_{}{}", Utc::now().timestamp_millis(), ext);
        tokio::fs::create_dir_all(&state.uploads_dir)
            .await
            .map_err(|err| ApiError::Internal(Box::new(err)))?;
        tokio::fs::write(Path::new(&state.uploads_dir).join(&name), &data)
            .await
            .map_err(|err| ApiError::Internal(Box::new(err)))?;
        stored = Some(name);
        break;
    }

    let name =
        stored.ok_or_else(|| ApiError::Validation("avatar file is required".to_string()))?;
    let avatar_url = format!("/uploads/{}", name);
    let updated = state
        .users
        .update_avatar_url(auth.id, &avatar_url)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "message": "Avatar updated",
        "user": SafeUser::from(&updated),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = body
        .email
        .ok_or_else(|| ApiError::Validation("Email is required".to_string()))?
        .trim()
        .to_lowercase();

    // Whether the account exists stays unobservable from the outside.
    let generic = Json(json!({
        "message": "If that account exists, a reset link has been sent",
    }));

    let Some(user) = state.users.find_user_by_email(&email).await? else {
        return Ok(generic);
    };

    let mut raw = [0u8; 32];
    rand::thread_rng().fill(&mut raw);
    let token = hex::encode(raw);

    let expires = BsonDateTime::from_millis(
        Utc::now().timestamp_millis() + RESET_TOKEN_TTL_MINUTES * 60_000,
    );
    state.users.set_reset_token(user._id, &token, expires).await?;

    let reset_url = reset_password_url(&state.frontend_url, &token)?;
    if let Err(err) = state
        .mailer
        .send_reset_password(&user.email, &user.fullname, reset_url.as_str())
        .await
    {
        tracing::error!(error = %err, user_id = %user._id, "failed to send reset email");
    }

    Ok(generic)
}

fn reset_password_url(frontend_url: &str, token: &str) -> Result<Url, ApiError> {
    let url = Url::parse(frontend_url)
        .and_then(|base| base.join(&format!("reset-password/{}", token)))
        .map_err(|err| ApiError::Internal(Box::new(err)))?;
    Ok(url)
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(token), Some(password)) = (body.token, body.password) else {
        return Err(ApiError::Validation(
            "token and password are required".to_string(),
        ));
    };
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let invalid = || ApiError::Validation("Invalid or expired reset token".to_string());

    let user = state
        .users
        .find_user_by_reset_token(&token)
        .await?
        .ok_or_else(invalid)?;
    let expires = user.reset_password_expires.ok_or_else(invalid)?;
    if expires.timestamp_millis() < Utc::now().timestamp_millis() {
        return Err(invalid());
    }

    state
        .users
        .reset_password(user._id, &hash_password(&password)?)
        .await?;
    tracing::info!(user_id = %user._id, "password reset completed");

    Ok(Json(json!({ "message": "Password has been reset" })))
}
