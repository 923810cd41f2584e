//! Request identity.
//!
//! The authenticating proxy in front of the service forwards the user id in `x-user-id`.
//! When a proxy key is configured the request must carry it in `x-proxy-key`, otherwise
//! the user header is rejected.
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, request::Parts},
};
use show::UserProfile;

use crate::{error::AppError, state::AppState};

pub const USER_HEADER: &str = "x-user-id";
pub const PROXY_KEY_HEADER: &str = "x-proxy-key";

/// Authenticated user id, with the profile when one has been created.
pub struct CurrentUser {
    pub id: String,
    pub profile: Option<UserProfile>,
}

/// A user whose profile carries the admin role.
pub struct AdminUser(pub UserProfile);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn user_id_from(headers: &HeaderMap, proxy_key: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(user_id) = header(headers, USER_HEADER) else {
        return Ok(None);
    };

    if let Some(expected) = proxy_key {
        if header(headers, PROXY_KEY_HEADER) != Some(expected) {
            return Err(AppError::Unauthenticated);
        }
    }

    // `:` separates the parts of a stored prediction key.
    if user_id.contains(':') {
        return Err(AppError::Unauthenticated);
    }

    Ok(Some(user_id.to_string()))
}

impl OptionalFromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(id) = user_id_from(&parts.headers, state.config.proxy_key.as_deref())? else {
            return Ok(None);
        };

        let profile = state.store.get_profile(&id).await?;

        Ok(Some(CurrentUser { id, profile }))
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        <CurrentUser as OptionalFromRequestParts<Arc<AppState>>>::from_request_parts(parts, state)
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let user = <CurrentUser as FromRequestParts<Arc<AppState>>>::from_request_parts(parts, state).await?;

        admin_profile(user)
    }
}

pub fn admin_profile(user: CurrentUser) -> Result<AdminUser, AppError> {
    match user.profile {
        Some(profile) if profile.is_admin() => Ok(AdminUser(profile)),
        _ => Err(AppError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use show::Role;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_missing_user_header_is_anonymous() {
        assert_eq!(user_id_from(&headers(&[]), None).unwrap(), None);
    }

    #[test]
    fn test_user_header_without_proxy_key() {
        let found = user_id_from(&headers(&[(USER_HEADER, " u1 ")]), None).unwrap();

        assert_eq!(found.as_deref(), Some("u1"));
    }

    #[test]
    fn test_proxy_key_enforced() {
        let spoofed = headers(&[(USER_HEADER, "u1")]);
        assert!(matches!(
            user_id_from(&spoofed, Some("secret")),
            Err(AppError::Unauthenticated)
        ));

        let proxied = headers(&[(USER_HEADER, "u1"), (PROXY_KEY_HEADER, "secret")]);
        assert_eq!(
            user_id_from(&proxied, Some("secret")).unwrap().as_deref(),
            Some("u1")
        );
    }

    #[test]
    fn test_user_id_with_key_separator_rejected() {
        let forged = headers(&[(USER_HEADER, "u1:e1")]);

        assert!(matches!(user_id_from(&forged, None), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_admin_requires_role() {
        let mut profile = UserProfile::new("u1", "viewer");
        let user = CurrentUser {
            id: "u1".to_string(),
            profile: Some(profile.clone()),
        };
        assert!(matches!(admin_profile(user), Err(AppError::Forbidden)));

        profile.role = Role::Admin;
        let admin = CurrentUser {
            id: "u1".to_string(),
            profile: Some(profile),
        };
        assert!(admin_profile(admin).is_ok());

        let anonymous_profile = CurrentUser {
            id: "u2".to_string(),
            profile: None,
        };
        assert!(matches!(admin_profile(anonymous_profile), Err(AppError::Forbidden)));
    }
}
