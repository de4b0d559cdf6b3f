use std::sync::atomic::{AtomicUsize, Ordering};

use jiff::{SignedDuration, Timestamp};
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use crate::{
    booking::BookingService,
    db::{self, Store},
    entities::{movie, reservation, user},
    error::BookingResult,
    models::{
        AuditoriumSnapshot, NewAuditorium, NewMovie, NewProjection, NewReservation, NewUser,
        ProjectionView,
    },
};

/// A booking service over a fresh database.
pub struct Fixture {
    pub store: Store,
    pub booking: BookingService,
    seq: AtomicUsize,
    _dir: Option<TempDir>,
}

impl Fixture {
    /// In-memory database behind a single connection.
    pub async fn new() -> Self {
        // Every pooled connection would get its own empty database.
        let db = db::connect_and_migrate("sqlite::memory:", 1).await.unwrap();
        Self::over(db, None)
    }

    /// Database file in a temporary directory, shared by `connections`
    /// pooled connections so operations can really run side by side.
    pub async fn on_disk(connections: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("marquee.db").display());
        let db = db::connect_and_migrate(&url, connections).await.unwrap();
        Self::over(db, Some(dir))
    }

    fn over(db: DatabaseConnection, dir: Option<TempDir>) -> Self {
        let store = Store::new(db);
        let booking = BookingService::new(store.clone(), SignedDuration::from_hours(3));
        Self { store, booking, seq: AtomicUsize::new(0), _dir: dir }
    }

    /// Now plus `hours`, truncated to whole seconds.
    pub fn in_hours(hours: i64) -> Timestamp {
        Timestamp::from_second(Timestamp::now().as_second() + hours * 3600).unwrap()
    }

    fn next(&self) -> usize {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// An auditorium with a full grid in a cinema of its own.
    pub async fn auditorium(&self, rows: i32, columns: i32) -> AuditoriumSnapshot {
        let name = format!("Cinema {}", self.next());
        let cinema = self.booking.create_cinema(&name).await.unwrap();
        self.auditorium_in(cinema.id, "Hall", rows, columns).await
    }

    pub async fn auditorium_in(
        &self,
        cinema_id: i32,
        name: &str,
        rows: i32,
        columns: i32,
    ) -> AuditoriumSnapshot {
        let req = NewAuditorium { cinema_id, name: name.to_string(), rows, columns };
        self.booking.create_auditorium(&req).await.unwrap()
    }

    pub async fn movie(&self, title: &str) -> movie::Model {
        self.booking
            .create_movie(&NewMovie {
                title: title.to_string(),
                year: 1979,
                rating: Some(8.1),
                current: true,
                banner_url: None,
            })
            .await
            .unwrap()
    }

    pub async fn user(&self, user_name: &str) -> user::Model {
        self.booking
            .create_user(&NewUser {
                first_name: "Test".to_string(),
                last_name: format!("User {}", self.next()),
                user_name: user_name.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn schedule(
        &self,
        auditorium_id: i32,
        movie_id: i32,
        starts_at: Timestamp,
    ) -> BookingResult<ProjectionView> {
        self.booking.create_projection(&NewProjection { auditorium_id, movie_id, starts_at }).await
    }

    /// A projection of a throwaway movie `hours` from now.
    pub async fn projection(&self, auditorium_id: i32, hours: i64) -> ProjectionView {
        let film = self.movie(&format!("Feature {}", self.next())).await;
        self.schedule(auditorium_id, film.id, Self::in_hours(hours)).await.unwrap()
    }

    pub async fn reserve(
        &self,
        projection_id: i32,
        seat_id: i32,
        user_id: i32,
    ) -> reservation::Model {
        let req =
            NewReservation { projection_id, seat_id, user_id, payment: false, message: None };
        self.booking.create_reservation(&req).await.unwrap()
    }
}
