//! Who is calling.
//!
//! Sessions are owned by the layer in front of this service; the API only
//! needs the caller's user id for cart endpoints.

use axum::http::HeaderMap;
use common::UserId;
use serde::Serialize;

/// The signed-in caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

/// Resolves the caller from request headers.
pub trait IdentityProvider: Send + Sync + 'static {
    fn identify(&self, headers: &HeaderMap) -> Option<Identity>;
}

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Trusts the `x-user-id` / `x-user-name` headers set by the session proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentity;

impl IdentityProvider for HeaderIdentity {
    fn identify(&self, headers: &HeaderMap) -> Option<Identity> {
        let user_id = headers
            .get(USER_ID_HEADER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<i64>()
            .ok()
            .map(UserId::new)
            .filter(UserId::is_positive)?;

        let display_name = headers
            .get(USER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Some(Identity {
            user_id,
            display_name,
        })
    }
}
