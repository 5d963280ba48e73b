//! Signup, login, and user listing endpoints

use crate::error::{AppErrorKind, AppResult};
use crate::middleware::error::{
    success_response, success_response_with_meta, tag_request_id, validation_rejection,
};
use crate::services::auth::{AuthService, LoginRequest, SignupRequest};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct UsersState {
    pub auth: Arc<AuthService>,
}

pub fn routes(state: UsersState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/api/users", get(list_users).post(create_user))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn signup(
    State(state): State<UsersState>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> AppResult<Response> {
    register(state, headers, request).await
}

async fn create_user(
    State(state): State<UsersState>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> AppResult<Response> {
    register(state, headers, request).await
}

async fn register(
    state: UsersState,
    headers: HeaderMap,
    request: SignupRequest,
) -> AppResult<Response> {
    // Echoed on rejection; password material stays out on purpose.
    let submitted = serde_json::json!({
        "email": request.email,
        "name": request.name,
        "age": request.age,
    });

    match state.auth.signup(request).await {
        Ok(user) => {
            Ok((StatusCode::CREATED, success_response(user).into_response()).into_response())
        }
        Err(error) if matches!(error.kind, AppErrorKind::Validation(_)) => {
            let error = tag_request_id(error, &headers);
            Ok(validation_rejection(&error, submitted))
        }
        Err(error) => Err(tag_request_id(error, &headers)),
    }
}

async fn login(
    State(state): State<UsersState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> AppResult<Response> {
    let user = state
        .auth
        .login(request)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;
    Ok(success_response(user).into_response())
}

async fn list_users(
    State(state): State<UsersState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let (users, total) = state
        .auth
        .list_users(page, limit)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;
    Ok(success_response_with_meta(
        users,
        serde_json::json!({
            "page": page,
            "limit": limit,
            "total": total,
            "pages": total_pages(total, limit),
        }),
    )
    .into_response())
}

/// Page count for the pagination meta, rounding up.
fn total_pages(total: i64, limit: u32) -> i64 {
    let limit = i64::from(limit.max(1));
    (total + limit - 1) / limit
}
