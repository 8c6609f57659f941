use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    AppState, Error,
    auth::{ADMIN, CredentialStore, TokenManager},
    middleware::{ADMIN_TOKEN_HEADER, USER_TOKEN_HEADER},
    util::{blocking, get_header},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user/login", post(login))
        .route("/user/{username}", get(exists).post(change_credential))
}

/// Routes that require the administrator secret in the `admin-token` header.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/user/{username}", put(create).delete(remove))
}

#[derive(Deserialize, Validate)]
struct Credential {
    #[serde(rename = "hash-pass", default)]
    #[validate(length(min = 1))]
    hash_pass: String,
}

#[derive(Deserialize, Validate)]
struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    user: String,
    #[serde(rename = "hash-pass", default)]
    #[validate(length(min = 1))]
    hash_pass: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: String,
    token: String,
}

async fn login(
    State(tokens): State<Arc<TokenManager>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Error> {
    request.validate()?;
    let token = tokens.issue(&request.user, &request.hash_pass)?;
    Ok(Json(LoginResponse {
        user: request.user,
        token,
    }))
}

async fn exists(
    State(store): State<Arc<CredentialStore>>,
    Path(username): Path<String>,
) -> Result<StatusCode, Error> {
    if store.exists(&username) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("User \"{username}\"")))
    }
}

async fn create(
    State(store): State<Arc<CredentialStore>>,
    Path(username): Path<String>,
    Json(request): Json<Credential>,
) -> Result<StatusCode, Error> {
    request.validate()?;
    blocking(move || store.create(&username, &request.hash_pass)).await?;
    Ok(StatusCode::CREATED)
}

async fn remove(
    State(store): State<Arc<CredentialStore>>,
    Path(username): Path<String>,
) -> Result<StatusCode, Error> {
    blocking(move || store.remove(&username)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Either the administrator or a holder of one of `username`'s tokens may change
/// its password hash.
async fn change_credential(
    State(tokens): State<Arc<TokenManager>>,
    Path(username): Path<String>,
    headers: HeaderMap,
    Json(request): Json<Credential>,
) -> Result<StatusCode, Error> {
    request.validate()?;
    let store = tokens.store().clone();

    let is_admin = get_header(&headers, ADMIN_TOKEN_HEADER)
        .is_some_and(|secret| store.verify(&secret, ADMIN));
    if !is_admin {
        let Some(token) = get_header(&headers, USER_TOKEN_HEADER) else {
            return Err(Error::unauthorized(&username, "missing user-token header"));
        };
        let owner = tokens
            .owner_of(&token)
            .map_err(|_| Error::unauthorized(&username, "unknown user token"))?;
        if owner != username {
            return Err(Error::unauthorized(&username, "token belongs to another user"));
        }
    }

    blocking(move || store.change_credential(&username, &request.hash_pass)).await?;
    Ok(StatusCode::NO_CONTENT)
}
