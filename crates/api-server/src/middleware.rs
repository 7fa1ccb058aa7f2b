//! Authentication middleware and role gates for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::marker::PhantomData;
use std::sync::Arc;

use auth::{authorize, Claims, Operation};
use trade_core::Actor;

use crate::error::{ApiError, ErrorResponse};
use crate::state::AppState;

/// Extract and validate the bearer token from the Authorization header.
/// On success, injects `Claims` into request extensions for use by handlers.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = match request.headers().get(AUTHORIZATION) {
        Some(header) => match header.to_str() {
            Ok(s) => s,
            Err(_) => {
                return unauthorized_response("Invalid authorization header encoding");
            }
        },
        None => {
            return unauthorized_response("Missing authorization header");
        }
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) if !t.trim().is_empty() => t.trim(),
        _ => {
            return unauthorized_response(
                "Invalid authorization format, expected 'Bearer <token>'",
            );
        }
    };

    let claims = match state.jwt.validate_access(token) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token validation failed");
            return unauthorized_response("Invalid or expired token");
        }
    };

    tracing::debug!(user_id = %claims.uid, role = %claims.role, "Authenticated request");

    request.extensions_mut().insert(claims);

    next.run(request).await
}

/// Helper to create an unauthorized (401) response.
fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse::new("UNAUTHORIZED", message);
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Claims attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))
    }
}

/// A guarded operation, named at the type level so handlers can declare it
/// in their signature.
pub trait Gate: Send + Sync + 'static {
    const OPERATION: Operation;
}

/// Authenticated caller whose role is in the allow-set of `G`.
/// Fails with 401 when no claims are attached and 403 when the role is not allowed.
pub struct Authorized<G: Gate> {
    pub claims: Claims,
    _gate: PhantomData<G>,
}

impl<G: Gate> Authorized<G> {
    pub fn actor(&self) -> Actor {
        self.claims.actor()
    }
}

impl<S, G> FromRequestParts<S> for Authorized<G>
where
    S: Send + Sync,
    G: Gate,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;

        if let Err(e) = authorize(claims.role, G::OPERATION) {
            tracing::debug!(
                user_id = %claims.uid,
                role = %claims.role,
                operation = G::OPERATION.as_str(),
                "Role not allowed"
            );
            return Err(e.into());
        }

        Ok(Self {
            claims,
            _gate: PhantomData,
        })
    }
}

macro_rules! gates {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            #[doc = concat!("Gate for `Operation::", stringify!($op), "`.")]
            pub struct $name;

            impl Gate for $name {
                const OPERATION: Operation = Operation::$op;
            }
        )*
    };
}

pub mod gate {
    use super::{Gate, Operation};

    gates! {
        ListOwnRfqs => ListOwnRfqs,
        CreateRfq => CreateRfq,
        ViewRfq => ViewRfq,
        UpdateRfqStatus => UpdateRfqStatus,
        ListOpenRfqs => ListOpenRfqs,
        CreateResponse => CreateResponse,
        ListResponses => ListResponses,
        ReviseResponse => ReviseResponse,
        DecideResponse => DecideResponse,
        AdminListRfqs => AdminListRfqs,
        AdminDeleteRfq => AdminDeleteRfq,
    }
}
