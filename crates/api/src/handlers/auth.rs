//! Registration and legacy password login
//!
//! Identity normally arrives pre-authenticated as a bearer token; the
//! only credential the core ever touches is the password comparison here.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use gabber_common::auth::{hash_password, verify_password};
use gabber_common::db::models::User;
use gabber_common::errors::{AppError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64))]
    pub fullname: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize)]
pub struct UserView {
    pub id: i64,
    pub fullname: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user: UserView,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
        }
    }
}

/// Map validator field errors onto the coded-error contract
fn field_codes(schema: &str, errors: &validator::ValidationErrors) -> AppError {
    let codes = errors
        .field_errors()
        .keys()
        .map(|field| format!("{}_{}_INVALID", schema, field).to_uppercase())
        .collect();
    AppError::Validation { codes }
}

/// Register a new account. An unregistered participant stub created from
/// a session upload is claimed instead of rejected as a duplicate.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    request.validate().map_err(|e| field_codes("USERS", &e))?;

    let repo = state.repo();
    let password_hash = hash_password(&request.password)?;

    let user = match repo.find_user_by_email(&request.email).await? {
        Some(existing) if existing.registered => {
            return Err(AppError::validation("USERS_EMAIL_EXISTS"));
        }
        Some(stub) => {
            repo.claim_unregistered_user(stub, request.fullname, password_hash)
                .await?
        }
        None => {
            repo.create_user(request.fullname, request.email, password_hash)
                .await?
        }
    };

    let access_token = state.jwt.issue_access(user.id, &user.email)?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            access_token,
            user: UserView::from(&user),
        }),
    ))
}

/// Legacy password login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    request.validate().map_err(|e| field_codes("USERS", &e))?;

    let repo = state.repo();

    let user = repo
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(AppError::unknown_user)?;

    // Same rejection for unclaimed accounts and wrong passwords
    let valid = user
        .password_hash
        .as_deref()
        .map(|hash| user.can_login() && verify_password(&request.password, hash))
        .unwrap_or(false);

    if !valid {
        return Err(AppError::unauthorized());
    }

    let access_token = state.jwt.issue_access(user.id, &user.email)?;

    Ok(Json(TokenResponse {
        access_token,
        user: UserView::from(&user),
    }))
}
