mod booking;
mod cascade;
mod config;
mod db;
mod entities;
mod error;
mod locks;
mod models;
mod routes;
mod schedule;
mod seat_grid;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{booking::BookingService, config::Config, db::Store};

pub struct AppState {
    pub config: Arc<Config>,
    pub booking: BookingService,
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/cinemas", post(routes::create_cinema))
        .route("/cinemas/with-auditorium", post(routes::create_cinema_with_auditorium))
        .route("/cinemas/{id}", put(routes::update_cinema).delete(routes::delete_cinema))
        .route("/auditoriums", post(routes::create_auditorium))
        .route(
            "/auditoriums/{id}",
            get(routes::get_auditorium).delete(routes::delete_auditorium),
        )
        .route("/auditoriums/{id}/grid", put(routes::resize_auditorium))
        .route("/seats/{id}", delete(routes::delete_seat))
        .route("/movies", post(routes::create_movie))
        .route("/movies/current", get(routes::current_movies))
        .route("/movies/{id}", put(routes::update_movie).delete(routes::delete_movie))
        .route("/movies/{id}/tags", post(routes::tag_movie))
        .route("/tags", post(routes::create_tag))
        .route("/tags/{id}", delete(routes::delete_tag))
        .route("/users", post(routes::create_user))
        .route("/users/{id}", delete(routes::delete_user))
        .route("/users/{id}/reservations", get(routes::user_reservations))
        .route("/projections", post(routes::create_projection).get(routes::list_projections))
        .route(
            "/projections/{id}",
            put(routes::reschedule_projection).delete(routes::delete_projection),
        )
        .route("/projections/{id}/reservations", get(routes::projection_reservations))
        .route("/reservations", post(routes::create_reservation))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,marquee=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url, config.db_max_connections).await?;
    let booking = BookingService::new(Store::new(db), config.projection_window);

    let state = Arc::new(AppState { config: config.clone(), booking });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %config.addr,
        window_minutes = config.projection_window.as_mins(),
        "listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
