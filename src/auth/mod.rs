//! Caller identity.
//!
//! Token issuance lives outside this service. Handlers only need the
//! `(id, role)` pair behind a bearer token, which an [`IdentityProvider`]
//! resolves. For drivers, `id` is the driver id.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Driver,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}, expected client/driver/admin")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn require_admin(&self) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            _ => Err(AppError::Forbidden("admin role required".to_string())),
        }
    }

    /// Returns the caller's driver id.
    pub fn require_driver(&self) -> Result<Uuid, AppError> {
        match self.role {
            Role::Driver => Ok(self.id),
            _ => Err(AppError::Forbidden("driver role required".to_string())),
        }
    }

    /// Admins, or the driver whose id is `driver_id`.
    pub fn require_admin_or_driver(&self, driver_id: Uuid) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Driver if self.id == driver_id => Ok(()),
            _ => Err(AppError::Forbidden(format!(
                "not allowed to act for driver {driver_id}"
            ))),
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<Caller>;
}

/// Fixed token table, seeded from config or filled at runtime.
#[derive(Default)]
pub struct StaticTokens {
    tokens: DashMap<String, Caller>,
}

impl StaticTokens {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Caller)>,
    {
        Self {
            tokens: entries.into_iter().collect(),
        }
    }

    /// Registers a fresh random token for `caller` and returns it.
    pub fn issue(&self, caller: Caller) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), caller);
        token
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

impl IdentityProvider for StaticTokens {
    fn authenticate(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).map(|entry| *entry.value())
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized("expected 'Bearer <token>' authorization".to_string())
            })?;

        state
            .identity
            .authenticate(token)
            .ok_or_else(|| AppError::Unauthorized("unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> Caller {
        Caller {
            id: Uuid::from_u128(7),
            role,
        }
    }

    #[test]
    fn issued_tokens_resolve_until_revoked() {
        let tokens = StaticTokens::default();
        let token = tokens.issue(caller(Role::Driver));

        assert_eq!(tokens.authenticate(&token), Some(caller(Role::Driver)));
        assert!(tokens.revoke(&token));
        assert_eq!(tokens.authenticate(&token), None);
    }

    #[test]
    fn role_checks() {
        assert!(caller(Role::Admin).require_admin().is_ok());
        assert!(caller(Role::Driver).require_admin().is_err());
        assert_eq!(caller(Role::Driver).require_driver().unwrap(), Uuid::from_u128(7));
        assert!(caller(Role::Client).require_driver().is_err());

        assert!(caller(Role::Driver)
            .require_admin_or_driver(Uuid::from_u128(7))
            .is_ok());
        assert!(caller(Role::Driver)
            .require_admin_or_driver(Uuid::from_u128(8))
            .is_err());
        assert!(caller(Role::Admin)
            .require_admin_or_driver(Uuid::from_u128(8))
            .is_ok());
    }
}
