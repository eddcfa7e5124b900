use axum::{async_trait, extract::FromRef, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{cookie::extract_token, jwt::JwtKeys};
use crate::{
    error::{ApiError, AuthRejection},
    state::AppState,
    users::repo_types::User,
};

/// Resolves the `jwt` cookie to a live user record.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, &state.config.cookie.name)
            .ok_or(AuthRejection::MissingToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            AuthRejection::InvalidToken
        })?;

        let user = state
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for unknown user");
                AuthRejection::UserNotFound
            })?;

        Ok(AuthUser(user))
    }
}

pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// An authenticated user holding the administrator role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_admin(&user).inspect_err(|_| {
            warn!(user_id = %user.id, "admin route refused");
        })?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewUser;
    use axum::http::{header, Request};
    use uuid::Uuid;

    async fn seeded(state: &AppState, is_admin: bool) -> User {
        state
            .store
            .insert_if_absent(NewUser {
                name: "Someone".into(),
                email: format!("{}@x.com", Uuid::new_v4()),
                password_hash: "unused".into(),
                is_admin,
            })
            .await
            .unwrap()
            .unwrap()
    }

    fn parts_with_cookie(cookie: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/profile");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_cookie_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_cookie(None);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, ApiError::Unauthenticated(AuthRejection::MissingToken)));
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let state = AppState::fake();
        let user = seeded(&state, false).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let mut parts = parts_with_cookie(Some(format!("jwt={token}x")));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, ApiError::Unauthenticated(AuthRejection::InvalidToken)));
    }

    #[tokio::test]
    async fn token_for_deleted_user_is_rejected() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign(Uuid::new_v4()).unwrap();
        let mut parts = parts_with_cookie(Some(format!("jwt={token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, ApiError::Unauthenticated(AuthRejection::UserNotFound)));
    }

    #[tokio::test]
    async fn valid_cookie_resolves_user() {
        let state = AppState::fake();
        let user = seeded(&state, false).await;
        let token = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        let mut parts = parts_with_cookie(Some(format!("jwt={token}")));
        let AuthUser(found) = AuthUser::from_request_parts(&mut parts, &state).await.ok().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn admin_gate_checks_role() {
        let state = AppState::fake();
        let plain = seeded(&state, false).await;
        let admin = seeded(&state, true).await;
        let keys = JwtKeys::from_ref(&state);

        let mut parts = parts_with_cookie(Some(format!("jwt={}", keys.sign(plain.id).unwrap())));
        let err = AdminUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, ApiError::Forbidden));

        let mut parts = parts_with_cookie(Some(format!("jwt={}", keys.sign(admin.id).unwrap())));
        let AdminUser(found) = AdminUser::from_request_parts(&mut parts, &state).await.ok().unwrap();
        assert_eq!(found.id, admin.id);
    }
}
