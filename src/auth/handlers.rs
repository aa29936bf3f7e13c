use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PingResponse, RegisteredUser, SignupRequest, SignupResponse},
        extractors::AuthUser,
        services::AuthService,
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/ping", get(ping))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(auth, payload))]
pub async fn signup(
    State(auth): State<AuthService>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AppResult<Json<SignupResponse>> {
    let Json(req) = payload?;
    Ok(Json(auth.signup(req).await?))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    Ok(Json(auth.login(req).await?))
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        ok: true,
        message: "Auth route is alive on NexusFlow One backend.",
    })
}

#[instrument(skip(auth, caller), fields(user_id = %caller.id))]
pub async fn get_me(
    State(auth): State<AuthService>,
    caller: AuthUser,
) -> AppResult<Json<RegisteredUser>> {
    let user = auth.current_user(caller.id).await?;
    Ok(Json(RegisteredUser::from(&user)))
}
