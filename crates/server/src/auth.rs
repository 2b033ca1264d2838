use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use shared::{
    domain::{Role, User},
    error::{ApiError, ErrorCode},
    protocol::SessionClaims,
};
use storage::{AdminStore, ROOT_USER_ID};
use thiserror::Error;
use tracing::warn;

pub const DEV_EMAIL_HEADER: &str = "x-user-email";

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("user directory unavailable: {0}")]
    Directory(anyhow::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Directory(error) => {
                warn!(%error, "caller lookup failed");
                ApiError::internal("Failed to authenticate")
            }
            other => ApiError::new(ErrorCode::Unauthorized, other.to_string()),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, AuthError>;
}

/// Stand-in for the corporate SSO: trusts the `x-user-email` header and looks
/// the role up in the admin directory.
pub struct DevAuthProvider {
    admin: Arc<dyn AdminStore>,
    default_email: Option<String>,
}

impl DevAuthProvider {
    pub fn new(admin: Arc<dyn AdminStore>, default_email: Option<String>) -> Self {
        Self {
            admin,
            default_email,
        }
    }
}

#[async_trait]
impl AuthProvider for DevAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, AuthError> {
        let email = headers
            .get(DEV_EMAIL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_email.clone())
            .ok_or(AuthError::MissingCredentials)?;

        let user = self
            .admin
            .find_user_by_email(&email)
            .await
            .map_err(AuthError::Directory)?
            .ok_or(AuthError::UnknownUser(email))?;
        Ok(Caller {
            email: user.email,
            name: user.name,
            role: user.role,
        })
    }
}

/// Verifies `Authorization: Bearer` session tokens signed with a shared secret.
pub struct JwtAuthProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Caller, AuthError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        let claims = decode::<SessionClaims>(token, &self.key, &self.validation)?.claims;
        let name = claims
            .name
            .unwrap_or_else(|| storage::display_name_from_email(&claims.sub));
        Ok(Caller {
            email: claims.sub,
            name,
            role: claims.role,
        })
    }
}

pub fn require_admin(caller: &Caller) -> Result<(), ApiError> {
    if caller.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::new(ErrorCode::Forbidden, "Admin access required"))
    }
}

/// Whether `caller` may hand out `role`. Admins may only create viewers.
pub fn ensure_can_grant(caller: &Caller, role: Role) -> Result<(), ApiError> {
    match caller.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin if role == Role::Viewer => Ok(()),
        Role::Admin => Err(ApiError::new(
            ErrorCode::Forbidden,
            format!("Admins cannot grant the {role} role"),
        )),
        Role::Viewer => Err(ApiError::new(ErrorCode::Forbidden, "Admin access required")),
    }
}

/// Role changes and removals. The root account is immutable and admins may
/// only manage viewers.
pub fn ensure_can_manage(caller: &Caller, target: &User) -> Result<(), ApiError> {
    require_admin(caller)?;
    if target.id == ROOT_USER_ID {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "The root administrator cannot be modified",
        ));
    }
    if caller.role == Role::Admin && target.role != Role::Viewer {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "Admins can only manage viewers",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
