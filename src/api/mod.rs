use axum::{Router, http::StatusCode};

use crate::{AppState, middleware::AdminLayer};

mod token;
mod user;

pub fn routes(state: &AppState) -> Router<AppState> {
    let admin_routes = user::admin_routes().route_layer(AdminLayer::new(state.store.clone()));

    Router::new()
        .nest(
            "/v1",
            Router::new()
                .merge(user::routes())
                .merge(admin_routes)
                .merge(token::routes()),
        )
        .fallback(|| async { StatusCode::NOT_FOUND })
}
