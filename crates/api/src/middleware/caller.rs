//! Caller identification for job endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use atelier_core::error::CoreError;
use atelier_core::preview::OwnerRef;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying a guest's client-generated correlation id.
pub const GUEST_ID_HEADER: &str = "x-guest-id";

/// The owner on whose behalf a request acts.
///
/// An `Authorization: Bearer <token>` header identifies a user and takes
/// precedence; otherwise `X-Guest-Id` identifies a guest. A request with
/// neither is rejected with 401. A present but invalid token is never
/// downgraded to a guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub OwnerRef);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth_header) = parts.headers.get("authorization") {
            let token = auth_header
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Core(CoreError::Unauthorized(
                        "Invalid Authorization format. Expected: Bearer <token>".into(),
                    ))
                })?;

            let claims = validate_token(token, &state.config.jwt).map_err(|_| {
                AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
            })?;
            return Ok(Caller(OwnerRef::User(claims.sub)));
        }

        match parts.headers.get(GUEST_ID_HEADER) {
            Some(value) => {
                let guest_id = value.to_str().map_err(|_| {
                    AppError::BadRequest("X-Guest-Id must be visible ASCII".into())
                })?;
                Ok(Caller(OwnerRef::Guest(guest_id.trim().to_string())))
            }
            None => Err(AppError::Core(CoreError::Unauthorized(
                "Missing Authorization or X-Guest-Id header".into(),
            ))),
        }
    }
}
