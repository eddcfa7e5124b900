use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        cookie::{cleared_cookie, session_cookie},
        extractors::{AdminUser, AuthUser},
        jwt::JwtKeys,
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{
            AdminUserUpdate, LoginRequest, MessageResponse, ProfileUpdate, RegisterRequest,
            UserResponse,
        },
        services::{self, Session},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/profile", get(get_profile).put(update_profile))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

fn with_session_cookie(state: &AppState, status: StatusCode, session: Session) -> impl IntoResponse {
    let ttl = JwtKeys::from_ref(state).ttl;
    let cookie = session_cookie(&state.config.cookie, &session.token, ttl);
    (
        status,
        [(SET_COOKIE, cookie)],
        Json(UserResponse::from(session.user)),
    )
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let session = services::login(&state, payload).await?;
    Ok(with_session_cookie(&state, StatusCode::OK, session))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let session = services::register(&state, payload).await?;
    Ok(with_session_cookie(&state, StatusCode::CREATED, session))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn logout(State(state): State<AppState>, AuthUser(user): AuthUser) -> impl IntoResponse {
    tracing::info!("user logged out");
    (
        [(SET_COOKIE, cleared_cookie(&state.config.cookie))],
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let user = services::get_profile(&state, user.id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let Json(payload) = payload?;
    let user = services::update_profile(&state, user.id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = services::list_users(&state).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = services::get_user(&state, parse_id(&id)?).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    payload: Result<Json<AdminUserUpdate>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let user = services::update_user(&state, id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_user(&state, parse_id(&id)?).await?;
    Ok(Json(MessageResponse {
        message: "User deleted",
    }))
}
