use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};

use crate::{
    cascade::CascadeReport,
    entities::{auditorium, cinema, projection, seat},
    error::BookingError,
    schedule,
    seat_grid::{self, GridChange},
};

/// An auditorium together with its seats, ordered by `(row, number)`.
#[derive(Clone, Debug, Serialize)]
pub struct AuditoriumSnapshot {
    pub auditorium: auditorium::Model,
    pub rows: i32,
    pub columns: i32,
    pub seats: Vec<seat::Model>,
}

impl AuditoriumSnapshot {
    pub fn new(auditorium: auditorium::Model, seats: Vec<seat::Model>) -> Self {
        let (rows, columns) = seat_grid::extent(&seats);
        Self { auditorium, rows, columns, seats }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ResizeOutcome {
    #[serde(flatten)]
    pub snapshot: AuditoriumSnapshot,
    pub change: GridChange,
}

/// The root row of a cascade as it was before deletion, plus what went with it.
#[derive(Clone, Debug, Serialize)]
pub struct Deleted<T> {
    pub entity: T,
    pub removed: CascadeReport,
}

#[derive(Clone, Debug, Serialize)]
pub struct CinemaWithAuditorium {
    pub cinema: cinema::Model,
    pub auditorium: AuditoriumSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectionView {
    pub id: i32,
    pub movie_id: i32,
    pub auditorium_id: i32,
    pub starts_at: Timestamp,
}

impl TryFrom<projection::Model> for ProjectionView {
    type Error = BookingError;

    fn try_from(model: projection::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            starts_at: schedule::starts_at(&model)?,
            id: model.id,
            movie_id: model.movie_id,
            auditorium_id: model.auditorium_id,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewCinema {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewAuditorium {
    pub cinema_id: i32,
    pub name: String,
    pub rows: i32,
    pub columns: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewCinemaWithAuditorium {
    pub cinema_name: String,
    pub auditorium_name: String,
    pub rows: i32,
    pub columns: i32,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct GridRequest {
    pub rows: i32,
    pub columns: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub year: i32,
    pub rating: Option<f64>,
    #[serde(default)]
    pub current: bool,
    pub banner_url: Option<String>,
}

/// Partial movie update. Absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub current: Option<bool>,
    pub banner_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTag {
    pub name: String,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct TagRef {
    pub tag_id: i32,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct NewProjection {
    pub auditorium_id: i32,
    pub movie_id: i32,
    pub starts_at: Timestamp,
}

/// New start time, and optionally a new movie, for an existing projection.
/// The auditorium stays fixed since reservations are bound to its seats.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Reschedule {
    pub starts_at: Timestamp,
    pub movie_id: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewReservation {
    pub projection_id: i32,
    pub seat_id: i32,
    pub user_id: i32,
    #[serde(default)]
    pub payment: bool,
    pub message: Option<String>,
}

/// Conjunctive projection filter. `date` matches the UTC calendar day of
/// the start time.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ProjectionFilter {
    pub cinema_id: Option<i32>,
    pub auditorium_id: Option<i32>,
    pub movie_id: Option<i32>,
    pub date: Option<Date>,
}
