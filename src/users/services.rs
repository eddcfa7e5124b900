use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{spawn_burn, spawn_hash, spawn_verify},
    },
    config::AdminSeed,
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{AdminUserUpdate, LoginRequest, ProfileUpdate, RegisterRequest},
        repo_types::{DeleteOutcome, NewUser, User, UserChanges},
    },
};

/// A user together with the token just issued for them.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank strings count as "not provided".
fn provided(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn checked_email(raw: &str) -> ApiResult<String> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::InvalidInput("Invalid email".into()));
    }
    Ok(email)
}

fn issue(state: &AppState, user: User) -> ApiResult<Session> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(Session { user, token })
}

pub async fn login(state: &AppState, req: LoginRequest) -> ApiResult<Session> {
    let email = normalize_email(&req.email);

    let Some(user) = state.store.find_by_email(&email).await? else {
        spawn_burn(req.password).await;
        warn!(email = %email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !spawn_verify(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    issue(state, user)
}

pub async fn register(state: &AppState, req: RegisterRequest) -> ApiResult<Session> {
    let name = provided(Some(req.name))
        .ok_or_else(|| ApiError::InvalidInput("Name is required".into()))?;
    let email = checked_email(&req.email)?;
    if req.password.is_empty() {
        return Err(ApiError::InvalidInput("Password is required".into()));
    }

    let password_hash = spawn_hash(req.password).await?;
    let new = NewUser {
        name,
        email,
        password_hash,
        is_admin: false,
    };
    let email = new.email.clone();
    let user = state.store.insert_if_absent(new).await?.ok_or_else(|| {
        warn!(email = %email, "email already registered");
        ApiError::DuplicateEmail
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue(state, user)
}

pub async fn get_profile(state: &AppState, user_id: Uuid) -> ApiResult<User> {
    state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn update_profile(state: &AppState, user_id: Uuid, upd: ProfileUpdate) -> ApiResult<User> {
    let mut changes = UserChanges {
        name: provided(upd.name),
        ..Default::default()
    };
    if let Some(email) = provided(upd.email) {
        changes.email = Some(checked_email(&email)?);
    }
    if let Some(password) = upd.password.filter(|p| !p.is_empty()) {
        changes.password_hash = Some(spawn_hash(password).await?);
    }

    let user = state
        .store
        .update(user_id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

pub async fn list_users(state: &AppState) -> ApiResult<Vec<User>> {
    Ok(state.store.list().await?)
}

pub async fn get_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    state.store.find_by_id(id).await?.ok_or(ApiError::NotFound)
}

pub async fn update_user(state: &AppState, id: Uuid, upd: AdminUserUpdate) -> ApiResult<User> {
    let mut changes = UserChanges {
        name: provided(upd.name),
        is_admin: upd.is_admin,
        ..Default::default()
    };
    if let Some(email) = provided(upd.email) {
        changes.email = Some(checked_email(&email)?);
    }

    let user = state
        .store
        .update(id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;
    info!(user_id = %user.id, is_admin = user.is_admin, "user updated by admin");
    Ok(user)
}

pub async fn delete_user(state: &AppState, id: Uuid) -> ApiResult<()> {
    match state.store.delete_unless_admin(id).await? {
        DeleteOutcome::Deleted => {
            info!(user_id = %id, "user deleted");
            Ok(())
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound),
        DeleteOutcome::Protected => {
            warn!(user_id = %id, "refused to delete admin");
            Err(ApiError::AdminDeleteForbidden)
        }
    }
}

/// Inserts the configured administrator unless the email already exists.
pub async fn seed_admin(state: &AppState, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = normalize_email(&seed.email);
    anyhow::ensure!(is_valid_email(&email), "ADMIN_EMAIL is not a valid email");
    anyhow::ensure!(!seed.password.is_empty(), "ADMIN_PASSWORD is empty");

    let password_hash = spawn_hash(seed.password.clone()).await?;
    let inserted = state
        .store
        .insert_if_absent(NewUser {
            name: seed.name.clone(),
            email: email.clone(),
            password_hash,
            is_admin: true,
        })
        .await?;

    match inserted {
        Some(user) => info!(user_id = %user.id, email = %email, "admin account created"),
        None => info!(email = %email, "admin account already present"),
    }
    Ok(())
}
