//! JWT auth for the family dashboard.
//!
//! - `/api/auth/register` creates an account (member by default)
//! - `/api/auth/login` verifies the password and returns a JWT
//! - Protected endpoints require `Authorization: Bearer <jwt>`; the
//!   middleware resolves the token to a live user row and injects a
//!   verified [`AuthUser`] for handlers and the workflow core.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::Sha256;

use super::routes::AppState;
use super::types::{
    ApiError, ApiResponse, ApiResult, LoginRequest, LoginResponse, PublicUser, RegisterRequest,
};
use crate::error::CoreError;
use crate::roles::Role;
use crate::store::User;
use crate::workflow::Actor;

const PBKDF2_ITERATIONS: u32 = 100_000;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject: user id
    sub: i64,
    /// Username (for display/auditing)
    usr: String,
    /// Role at issue time; re-checked against the user row per request
    rol: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Verified caller identity, injected by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
        }
    }
}

pub fn hash_password(password: &str, salt_hex: &str) -> String {
    let salt = hex::decode(salt_hex).unwrap_or_default();
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut out);
    hex::encode(out)
}

pub fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(secret: &str, ttl_days: i64, user: &User) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id,
        usr: user.username.clone(),
        rol: user.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<PublicUser> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::Core(CoreError::Validation(
            "username must not be empty".to_string(),
        )));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Core(CoreError::Validation(
            "password must be at least 6 characters".to_string(),
        )));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Core(CoreError::Validation(
            "email address is not valid".to_string(),
        )));
    }

    let role = req.role.unwrap_or(Role::Member);
    let salt = generate_salt();
    let hash = hash_password(&req.password, &salt);
    let user = state
        .store
        .create_user(username, req.email.trim(), role, &hash, &salt)
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "user registered");
    Ok(ApiResponse::ok(user.into()))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = state.store.user_by_username(req.username.trim()).await?;

    // One generic failure for both unknown username and bad password, with
    // a dummy hash on the miss path to keep timing uniform.
    let valid = match &user {
        Some(u) => constant_time_eq(&hash_password(&req.password, &u.salt), &u.password_hash),
        None => {
            let _ = hash_password(&req.password, "00000000000000000000000000000000");
            false
        }
    };
    if !valid {
        return Err(ApiError::Core(CoreError::Forbidden(
            "invalid username or password".to_string(),
        )));
    }
    let user = user.expect("checked above");

    let (token, exp) = issue_jwt(
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_ttl_days,
        &user,
    )
    .map_err(ApiError::Internal)?;

    Ok(ApiResponse::ok(LoginResponse {
        token,
        exp,
        user: user.into(),
    }))
}

pub async fn me(
    axum::extract::Extension(user): axum::extract::Extension<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<PublicUser> {
    let user = state.store.user_by_id(user.id).await?;
    Ok(ApiResponse::ok(user.into()))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    let claims = match verify_jwt(token, &state.config.auth.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response();
        }
    };

    // Resolve to the live user row: picks up role changes and deleted
    // accounts instead of trusting stale claims.
    let user = match state.store.user_by_id(claims.sub).await {
        Ok(user) => user,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Invalid user").into_response();
        }
    };

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
    });
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_per_salt() {
        let salt = generate_salt();
        let a = hash_password("hunter2", &salt);
        let b = hash_password("hunter2", &salt);
        assert_eq!(a, b);

        let other_salt = generate_salt();
        assert_ne!(a, hash_password("hunter2", &other_salt));
        assert_ne!(a, hash_password("hunter3", &salt));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }

    #[test]
    fn test_jwt_round_trip() {
        let user = User {
            id: 7,
            username: "mom".to_string(),
            email: "mom@example.com".to_string(),
            role: Role::Parent,
            password_hash: String::new(),
            salt: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let (token, exp) = issue_jwt("secret", 1, &user).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.rol, "parent");
        assert!(verify_jwt(&token, "wrong-secret").is_err());
    }
}
