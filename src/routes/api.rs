use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::requests::{
    CreatePostRequest, LoginRequest, PostIdRequest, RegisterRequest, UserIdRequest, Validate,
};
use crate::api::responses::{Ack, Created, LoginResponse};
use crate::api::Action;
use crate::auth::password;
use crate::db::models::PostStatus;
use crate::db::{posts, users};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub action: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api", any(dispatch))
        .route("/api.php", any(dispatch))
}

/// Single entry point: `?action=` picks the operation.
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<ActionQuery>,
    body: Bytes,
) -> AppResult<Response> {
    // Unknown or missing action
    let action: Action = query.action.parse().map_err(|_| {
        tracing::debug!("Unknown action {:?}", query.action);
        AppError::InvalidAction
    })?;

    // Mutating actions only accept a POST body
    if action.takes_body() && method != Method::POST {
        return Err(AppError::MethodNotAllowed(action.to_string()));
    }

    tracing::debug!(%action, %method, "Dispatching action");

    match action {
        Action::Register => register(&state, parse_body(&body)?),
        Action::Login => login(&state, parse_body(&body)?),
        Action::CreatePost => create_post(&state, parse_body(&body)?),
        Action::GetPosts => list_posts(&state, PostStatus::Approved),
        Action::GetPendingPosts => list_posts(&state, PostStatus::Pending),
        Action::ApprovePost => approve_post(&state, parse_body(&body)?),
        Action::DeletePost => delete_post(&state, parse_body(&body)?),
        Action::GetUsers => Ok(Json(users::list(&state.db)?).into_response()),
        Action::DeleteUser => delete_user(&state, parse_body(&body)?),
        Action::SuspendUser => suspend_user(&state, parse_body(&body)?),
    }
}

fn parse_body<T: DeserializeOwned + Validate>(body: &Bytes) -> AppResult<T> {
    let request: T = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
    request.validate()?;
    Ok(request)
}

fn register(state: &AppState, req: RegisterRequest) -> AppResult<Response> {
    // Never store the plaintext
    let password_hash = password::hash_password(&req.password, state.bcrypt_cost())?;

    let id = users::insert(
        &state.db,
        &users::NewUser {
            full_name: &req.full_name,
            email: &req.email,
            password_hash: &password_hash,
            user_type: &req.user_type,
            sport: req.sport.as_deref(),
            location: req.location.as_deref(),
            is_admin: false,
        },
    )?;

    tracing::info!(user_id = id, "Registered user");
    Ok(Json(Created::new(id)).into_response())
}

fn login(state: &AppState, req: LoginRequest) -> AppResult<Response> {
    let response = match users::find_credentials(&state.db, &req.email)? {
        Some((user, hash)) if password::verify_password(&req.password, &hash) => {
            tracing::info!(user_id = user.id, "Login succeeded");
            LoginResponse::accepted(user)
        }
        // Unknown email and wrong password look the same to the caller
        _ => {
            tracing::info!("Login rejected");
            LoginResponse::rejected()
        }
    };

    Ok(Json(response).into_response())
}

fn create_post(state: &AppState, req: CreatePostRequest) -> AppResult<Response> {
    let id = posts::insert(&state.db, req.author_id, &req.content, &req.attachments)?;
    tracing::info!(post_id = id, author_id = req.author_id, "Post submitted for moderation");
    Ok(Json(Created::new(id)).into_response())
}

fn list_posts(state: &AppState, status: PostStatus) -> AppResult<Response> {
    let posts = posts::list_by_status(&state.db, status)?;
    Ok(Json(posts).into_response())
}

fn approve_post(state: &AppState, req: PostIdRequest) -> AppResult<Response> {
    posts::approve(&state.db, req.post_id)?;
    tracing::info!(post_id = req.post_id, "Post approved");
    Ok(Json(Ack::ok()).into_response())
}

fn delete_post(state: &AppState, req: PostIdRequest) -> AppResult<Response> {
    posts::delete(&state.db, req.post_id)?;
    tracing::info!(post_id = req.post_id, "Post deleted");
    Ok(Json(Ack::ok()).into_response())
}

fn delete_user(state: &AppState, req: UserIdRequest) -> AppResult<Response> {
    users::delete(&state.db, req.user_id)?;
    tracing::info!(user_id = req.user_id, "User deleted");
    Ok(Json(Ack::ok()).into_response())
}

fn suspend_user(state: &AppState, req: UserIdRequest) -> AppResult<Response> {
    users::suspend(&state.db, req.user_id)?;
    tracing::info!(user_id = req.user_id, "User suspended");
    Ok(Json(Ack::ok()).into_response())
}
