//! Request extractors that reject with the JSON envelope.

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use quiz_core::model::{Role, UserId};
use services::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller, as forwarded by the gateway.
///
/// A missing or malformed `x-user-id` is a 401; an absent role defaults to
/// `user` and an unknown one is a 401 as well.
pub struct AuthCaller(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for AuthCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: UserId = header_value(parts, USER_ID_HEADER)?
            .ok_or(ApiError::Unauthorized)?
            .parse()
            .map_err(|_| ApiError::Unauthorized)?;
        let role = match header_value(parts, USER_ROLE_HEADER)? {
            None | Some("") => Role::default(),
            Some(raw) => raw.parse().map_err(|_| ApiError::Unauthorized)?,
        };
        Ok(AuthCaller(Caller::new(user_id, role)))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|v| v.to_str().map(str::trim).map_err(|_| ApiError::Unauthorized))
        .transpose()
}

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
