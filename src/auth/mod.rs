//! Principal resolution and role/permission gating.
//!
//! Token validation itself belongs to an external identity service; this
//! module only defines the contract the core consumes (an authenticated
//! principal with role and permission set) plus a JWT-backed default
//! implementation. The resolver is injected into the router constructor
//! rather than wired through any global state.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Permission names checked by the core's handlers.
pub mod consts {
    pub const ORDERS_MANAGE: &str = "manage_orders";
    pub const WAREHOUSE_MANAGE: &str = "manage_warehouse";
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Courier,
    Staff,
    Admin,
}

/// The authenticated principal attached to every request the core handles.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub role: Role,
    pub permissions: Vec<String>,
    pub is_active: bool,
}

impl CurrentUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::Admin || self.permissions.iter().any(|p| p == permission)
    }

    pub fn require_permission(&self, permission: &str) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "missing permission '{permission}'"
            )))
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role == role || self.role == Role::Admin {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "requires role '{role}'"
            )))
        }
    }
}

/// Contract with the external auth subsystem: turn request headers into an
/// authenticated principal, or fail.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<CurrentUser, ServiceError>;
}

/// JWT claims the default resolver understands.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub exp: i64,
    pub iat: i64,
}

fn default_active() -> bool {
    true
}

/// Default resolver: validates a `Bearer` JWT signed with the shared secret.
pub struct JwtPrincipalResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtPrincipalResolver {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl PrincipalResolver for JwtPrincipalResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<CurrentUser, ServiceError> {
        let header_value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("expected Bearer token".into()))?;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthorized("token subject is not a UUID".into()))?;
        let role = data
            .claims
            .role
            .parse::<Role>()
            .map_err(|_| ServiceError::Unauthorized(format!("unknown role '{}'", data.claims.role)))?;

        Ok(CurrentUser {
            user_id,
            role,
            permissions: data.claims.permissions,
            is_active: data.claims.active,
        })
    }
}

/// Axum middleware that resolves the principal and stores it in request
/// extensions. Inactive principals are rejected outright.
pub async fn authenticate(
    State(resolver): State<Arc<dyn PrincipalResolver>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = resolver.resolve(request.headers()).await?;
    if !user.is_active {
        return Err(ServiceError::Forbidden("account is deactivated".into()));
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("request is not authenticated".into()))
    }
}
