use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    entities::{auditorium, cinema, movie, movie_tag, reservation, seat, tag, user},
    error::AppResult,
    models::{
        AuditoriumSnapshot, CinemaWithAuditorium, Deleted, GridRequest, MovieUpdate,
        NewAuditorium, NewCinema, NewCinemaWithAuditorium, NewMovie, NewProjection,
        NewReservation, NewTag, NewUser, ProjectionFilter, ProjectionView, Reschedule,
        ResizeOutcome, TagRef,
    },
};

type Shared = State<Arc<AppState>>;
type Created<T> = (StatusCode, Json<T>);

fn created<T>(value: T) -> Created<T> {
    (StatusCode::CREATED, Json(value))
}

pub async fn health(State(state): Shared) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "projection_window_minutes": state.config.projection_window.as_mins(),
    }))
}

pub async fn create_cinema(
    State(state): Shared,
    Json(req): Json<NewCinema>,
) -> AppResult<Created<cinema::Model>> {
    Ok(created(state.booking.create_cinema(&req.name).await?))
}

pub async fn update_cinema(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(req): Json<NewCinema>,
) -> AppResult<Json<cinema::Model>> {
    Ok(Json(state.booking.update_cinema(id, &req.name).await?))
}

pub async fn create_cinema_with_auditorium(
    State(state): Shared,
    Json(req): Json<NewCinemaWithAuditorium>,
) -> AppResult<Created<CinemaWithAuditorium>> {
    Ok(created(state.booking.create_cinema_with_auditorium(&req).await?))
}

pub async fn delete_cinema(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<cinema::Model>>> {
    Ok(Json(state.booking.delete_cinema(id).await?))
}

pub async fn create_auditorium(
    State(state): Shared,
    Json(req): Json<NewAuditorium>,
) -> AppResult<Created<AuditoriumSnapshot>> {
    Ok(created(state.booking.create_auditorium(&req).await?))
}

pub async fn get_auditorium(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<AuditoriumSnapshot>> {
    Ok(Json(state.booking.get_auditorium(id).await?))
}

pub async fn resize_auditorium(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(req): Json<GridRequest>,
) -> AppResult<Json<ResizeOutcome>> {
    Ok(Json(state.booking.resize_auditorium(id, req.rows, req.columns).await?))
}

pub async fn delete_auditorium(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<auditorium::Model>>> {
    Ok(Json(state.booking.delete_auditorium(id).await?))
}

pub async fn delete_seat(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<seat::Model>>> {
    Ok(Json(state.booking.delete_seat(id).await?))
}

pub async fn create_movie(
    State(state): Shared,
    Json(req): Json<NewMovie>,
) -> AppResult<Created<movie::Model>> {
    Ok(created(state.booking.create_movie(&req).await?))
}

pub async fn update_movie(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(req): Json<MovieUpdate>,
) -> AppResult<Json<movie::Model>> {
    Ok(Json(state.booking.update_movie(id, &req).await?))
}

pub async fn current_movies(State(state): Shared) -> AppResult<Json<Vec<movie::Model>>> {
    Ok(Json(state.booking.current_movies().await?))
}

pub async fn delete_movie(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<movie::Model>>> {
    Ok(Json(state.booking.delete_movie(id).await?))
}

pub async fn tag_movie(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(req): Json<TagRef>,
) -> AppResult<Json<movie_tag::Model>> {
    Ok(Json(state.booking.tag_movie(id, req.tag_id).await?))
}

pub async fn create_tag(
    State(state): Shared,
    Json(req): Json<NewTag>,
) -> AppResult<Json<tag::Model>> {
    Ok(Json(state.booking.create_tag(&req.name).await?))
}

pub async fn delete_tag(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<tag::Model>>> {
    Ok(Json(state.booking.delete_tag(id).await?))
}

pub async fn create_user(
    State(state): Shared,
    Json(req): Json<NewUser>,
) -> AppResult<Created<user::Model>> {
    Ok(created(state.booking.create_user(&req).await?))
}

pub async fn delete_user(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<user::Model>>> {
    Ok(Json(state.booking.delete_user(id).await?))
}

pub async fn user_reservations(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<reservation::Model>>> {
    Ok(Json(state.booking.reservations_for_user(id).await?))
}

pub async fn create_projection(
    State(state): Shared,
    Json(req): Json<NewProjection>,
) -> AppResult<Created<ProjectionView>> {
    Ok(created(state.booking.create_projection(&req).await?))
}

pub async fn reschedule_projection(
    State(state): Shared,
    Path(id): Path<i32>,
    Json(req): Json<Reschedule>,
) -> AppResult<Json<ProjectionView>> {
    Ok(Json(state.booking.reschedule_projection(id, &req).await?))
}

pub async fn list_projections(
    State(state): Shared,
    Query(filter): Query<ProjectionFilter>,
) -> AppResult<Json<Vec<ProjectionView>>> {
    Ok(Json(state.booking.filter_projections(&filter).await?))
}

pub async fn delete_projection(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Deleted<ProjectionView>>> {
    Ok(Json(state.booking.delete_projection(id).await?))
}

pub async fn projection_reservations(
    State(state): Shared,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<reservation::Model>>> {
    Ok(Json(state.booking.reservations_for_projection(id).await?))
}

pub async fn create_reservation(
    State(state): Shared,
    Json(req): Json<NewReservation>,
) -> AppResult<Created<reservation::Model>> {
    Ok(created(state.booking.create_reservation(&req).await?))
}
