use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Serialize;

use crate::{AppState, Error, auth::TokenManager};

pub fn routes() -> Router<AppState> {
    Router::new().route("/token/{token}", get(owner).delete(revoke))
}

#[derive(Serialize)]
struct OwnerResponse {
    user: String,
}

async fn owner(
    State(tokens): State<Arc<TokenManager>>,
    Path(token): Path<String>,
) -> Result<Json<OwnerResponse>, Error> {
    let user = tokens.owner_of(&token)?;
    Ok(Json(OwnerResponse { user }))
}

async fn revoke(
    State(tokens): State<Arc<TokenManager>>,
    Path(token): Path<String>,
) -> StatusCode {
    if tokens.revoke_token(&token) {
        debug!("token revoked");
    }
    StatusCode::NO_CONTENT
}
