//! Every inbound booking operation.
//!
//! Each operation takes the auditorium guards it needs, opens one unit of
//! work, and commits it exactly once after all stages succeed. Any early
//! return drops the unit of work, so a failed operation leaves no trace.

use jiff::{SignedDuration, Timestamp, tz::TimeZone};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PrimaryKeyTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{debug, info, warn};

use crate::{
    cascade::{self, Root},
    db::Store,
    entities::{auditorium, cinema, movie, movie_tag, projection, reservation, seat, tag, user},
    error::{BookingError, BookingResult, PROJECTION_IN_PAST},
    models::{
        AuditoriumSnapshot, CinemaWithAuditorium, Deleted, MovieUpdate, NewAuditorium,
        NewCinemaWithAuditorium, NewMovie, NewProjection, NewReservation, NewUser,
        ProjectionFilter, ProjectionView, Reschedule, ResizeOutcome,
    },
    schedule,
    seat_grid::{self, Cell},
};

#[derive(Clone)]
pub struct BookingService {
    store: Store,
    window: SignedDuration,
}

async fn fetch<E, C>(conn: &C, root: Root, id: i32) -> BookingResult<E::Model>
where
    E: EntityTrait,
    C: ConnectionTrait,
    i32: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    E::find_by_id(id).one(conn).await?.ok_or_else(|| BookingError::not_found(root.name(), id))
}

async fn traced<T>(
    op: &'static str,
    work: impl Future<Output = BookingResult<T>>,
) -> BookingResult<T> {
    let result = work.await;
    if let Err(err) = &result {
        warn!(op, error = %err, "unit of work aborted");
    }
    result
}

fn required_name(kind: &str, name: &str) -> BookingResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BookingError::Invalid(format!("{kind} name is required")));
    }
    Ok(name.to_string())
}

/// Start time as it will be stored, rejected when already past.
fn upcoming_start(starts_at: Timestamp) -> BookingResult<Timestamp> {
    let starts_at = Timestamp::from_second(starts_at.as_second())
        .map_err(|err| BookingError::Invalid(err.to_string()))?;
    if starts_at < Timestamp::now() {
        return Err(BookingError::Invalid(PROJECTION_IN_PAST.to_string()));
    }
    Ok(starts_at)
}

fn day_bounds(date: jiff::civil::Date) -> BookingResult<(i64, i64)> {
    let invalid = |err: jiff::Error| BookingError::Invalid(format!("date {date}: {err}"));
    let start = date.to_zoned(TimeZone::UTC).map_err(invalid)?.timestamp();
    let end = date.tomorrow().and_then(|d| d.to_zoned(TimeZone::UTC)).map_err(invalid)?;
    Ok((start.as_second(), end.timestamp().as_second()))
}

async fn auditorium_ids<C: ConnectionTrait>(conn: &C, cinema_id: i32) -> BookingResult<Vec<i32>> {
    Ok(auditorium::Entity::find()
        .select_only()
        .column(auditorium::Column::Id)
        .filter(auditorium::Column::CinemaId.eq(cinema_id))
        .order_by_asc(auditorium::Column::Id)
        .into_tuple()
        .all(conn)
        .await?)
}

impl BookingService {
    pub fn new(store: Store, window: SignedDuration) -> Self {
        Self { store, window }
    }

    async fn insert_cinema<C>(conn: &C, name: &str) -> BookingResult<cinema::Model>
    where
        C: ConnectionTrait,
    {
        let name = required_name("cinema", name)?;
        Self::ensure_cinema_name_free(conn, &name, None).await?;
        Ok(cinema::ActiveModel { name: Set(name), ..Default::default() }.insert(conn).await?)
    }

    async fn ensure_cinema_name_free<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        except: Option<i32>,
    ) -> BookingResult<()> {
        let mut query = cinema::Entity::find().filter(cinema::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(cinema::Column::Id.ne(id));
        }
        if query.one(conn).await?.is_some() {
            return Err(BookingError::NameCollision { entity: "cinema", name: name.to_string() });
        }
        Ok(())
    }

    async fn insert_auditorium<C: ConnectionTrait>(
        conn: &C,
        cinema_id: i32,
        name: &str,
        rows: i32,
        columns: i32,
    ) -> BookingResult<AuditoriumSnapshot> {
        let name = required_name("auditorium", name)?;
        let cells = seat_grid::full_grid(rows, columns)?;

        let taken = auditorium::Entity::find()
            .filter(auditorium::Column::CinemaId.eq(cinema_id))
            .filter(auditorium::Column::Name.eq(&name))
            .one(conn)
            .await?;
        if taken.is_some() {
            return Err(BookingError::NameCollision { entity: "auditorium", name });
        }

        let hall = auditorium::ActiveModel {
            cinema_id: Set(cinema_id),
            name: Set(name),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        seat_grid::insert_cells(conn, hall.id, &cells).await?;
        let seats = seat_grid::load_seats(conn, hall.id).await?;
        Ok(AuditoriumSnapshot::new(hall, seats))
    }

    /// Fails with `ScheduleConflict` when a projection in the auditorium,
    /// other than `except`, starts within the window around `starts_at`.
    async fn check_schedule<C: ConnectionTrait>(
        &self,
        conn: &C,
        auditorium_id: i32,
        starts_at: Timestamp,
        except: Option<i32>,
    ) -> BookingResult<()> {
        let mut query =
            projection::Entity::find().filter(projection::Column::AuditoriumId.eq(auditorium_id));
        if let Some(id) = except {
            query = query.filter(projection::Column::Id.ne(id));
        }
        let scheduled = query
            .all(conn)
            .await?
            .iter()
            .map(schedule::starts_at)
            .collect::<BookingResult<Vec<_>>>()?;
        schedule::check_conflict(starts_at, scheduled, self.window)
    }

    pub async fn create_cinema(&self, name: &str) -> BookingResult<cinema::Model> {
        traced("create_cinema", async {
            let uow = self.store.begin().await?;
            let created = Self::insert_cinema(uow.conn(), name).await?;
            uow.commit().await?;
            info!(cinema_id = created.id, "cinema created");
            Ok(created)
        })
        .await
    }

    /// Renames a cinema. Keeping its current name is not a collision.
    pub async fn update_cinema(&self, id: i32, name: &str) -> BookingResult<cinema::Model> {
        traced("update_cinema", async {
            let name = required_name("cinema", name)?;
            let uow = self.store.begin().await?;
            let found = fetch::<cinema::Entity, _>(uow.conn(), Root::Cinema, id).await?;
            Self::ensure_cinema_name_free(uow.conn(), &name, Some(id)).await?;

            let mut active: cinema::ActiveModel = found.into();
            active.name = Set(name);
            let updated = active.update(uow.conn()).await?;
            uow.commit().await?;
            info!(cinema_id = id, name = %updated.name, "cinema renamed");
            Ok(updated)
        })
        .await
    }

    pub async fn create_auditorium(
        &self,
        req: &NewAuditorium,
    ) -> BookingResult<AuditoriumSnapshot> {
        traced("create_auditorium", async {
            let uow = self.store.begin().await?;
            fetch::<cinema::Entity, _>(uow.conn(), Root::Cinema, req.cinema_id).await?;
            let created =
                Self::insert_auditorium(uow.conn(), req.cinema_id, &req.name, req.rows, req.columns)
                    .await?;
            uow.commit().await?;
            info!(
                auditorium_id = created.auditorium.id,
                cinema_id = req.cinema_id,
                seats = created.seats.len(),
                "auditorium created"
            );
            Ok(created)
        })
        .await
    }

    pub async fn create_cinema_with_auditorium(
        &self,
        req: &NewCinemaWithAuditorium,
    ) -> BookingResult<CinemaWithAuditorium> {
        traced("create_cinema_with_auditorium", async {
            let uow = self.store.begin().await?;
            let cinema = Self::insert_cinema(uow.conn(), &req.cinema_name).await?;
            let auditorium = Self::insert_auditorium(
                uow.conn(),
                cinema.id,
                &req.auditorium_name,
                req.rows,
                req.columns,
            )
            .await?;
            uow.commit().await?;
            info!(
                cinema_id = cinema.id,
                auditorium_id = auditorium.auditorium.id,
                "cinema created"
            );
            Ok(CinemaWithAuditorium { cinema, auditorium })
        })
        .await
    }

    pub async fn get_auditorium(&self, id: i32) -> BookingResult<AuditoriumSnapshot> {
        let db = self.store.db();
        let hall = fetch::<auditorium::Entity, _>(db, Root::Auditorium, id).await?;
        let seats = seat_grid::load_seats(db, id).await?;
        Ok(AuditoriumSnapshot::new(hall, seats))
    }

    /// Moves the auditorium's seat grid to `rows × columns`. Seats inside
    /// both the old and new extent keep their ids and reservations.
    pub async fn resize_auditorium(
        &self,
        id: i32,
        rows: i32,
        columns: i32,
    ) -> BookingResult<ResizeOutcome> {
        traced("resize_auditorium", async {
            let _guard = self.store.locks().lock(id).await;
            let uow = self.store.begin().await?;

            let hall = fetch::<auditorium::Entity, _>(uow.conn(), Root::Auditorium, id).await?;
            let seats = seat_grid::load_seats(uow.conn(), id).await?;
            let plan = seat_grid::plan_resize(seats, rows, columns)?;
            let change = seat_grid::apply(uow.conn(), id, &plan).await?;
            let seats = seat_grid::load_seats(uow.conn(), id).await?;

            uow.commit().await?;
            info!(
                auditorium_id = id,
                rows,
                columns,
                inserted = change.inserted,
                deleted = change.deleted,
                "auditorium resized"
            );
            Ok(ResizeOutcome { snapshot: AuditoriumSnapshot::new(hall, seats), change })
        })
        .await
    }

    /// Deletes a cinema with all of its auditoriums. The guards cover the
    /// auditoriums that exist once the transaction is open; when one was
    /// added or removed while waiting, the guards are taken again.
    pub async fn delete_cinema(&self, id: i32) -> BookingResult<Deleted<cinema::Model>> {
        traced("delete_cinema", async {
            loop {
                let halls = auditorium_ids(self.store.db(), id).await?;
                let _guard = self.store.locks().lock_many(halls.iter().copied()).await;
                let uow = self.store.begin().await?;

                let entity = fetch::<cinema::Entity, _>(uow.conn(), Root::Cinema, id).await?;
                if auditorium_ids(uow.conn(), id).await? != halls {
                    debug!(cinema_id = id, "auditoriums changed while locking, retrying");
                    continue;
                }
                let removed = cascade::delete(uow.conn(), Root::Cinema, id).await?;

                uow.commit().await?;
                info!(cinema_id = id, removed = ?removed.removed, "cinema deleted");
                return Ok(Deleted { entity, removed });
            }
        })
        .await
    }

    pub async fn delete_auditorium(&self, id: i32) -> BookingResult<Deleted<auditorium::Model>> {
        traced("delete_auditorium", async {
            let _guard = self.store.locks().lock(id).await;
            let uow = self.store.begin().await?;

            let entity = fetch::<auditorium::Entity, _>(uow.conn(), Root::Auditorium, id).await?;
            let removed = cascade::delete(uow.conn(), Root::Auditorium, id).await?;

            uow.commit().await?;
            info!(auditorium_id = id, removed = ?removed.removed, "auditorium deleted");
            Ok(Deleted { entity, removed })
        })
        .await
    }

    pub async fn delete_seat(&self, id: i32) -> BookingResult<Deleted<seat::Model>> {
        traced("delete_seat", async {
            let located = fetch::<seat::Entity, _>(self.store.db(), Root::Seat, id).await?;
            let _guard = self.store.locks().lock(located.auditorium_id).await;
            let uow = self.store.begin().await?;

            let entity = fetch::<seat::Entity, _>(uow.conn(), Root::Seat, id).await?;
            let removed = cascade::delete(uow.conn(), Root::Seat, id).await?;

            uow.commit().await?;
            info!(seat_id = id, auditorium_id = entity.auditorium_id, "seat deleted");
            Ok(Deleted { entity, removed })
        })
        .await
    }

    pub async fn delete_projection(&self, id: i32) -> BookingResult<Deleted<ProjectionView>> {
        traced("delete_projection", async {
            let db = self.store.db();
            let located = fetch::<projection::Entity, _>(db, Root::Projection, id).await?;
            let _guard = self.store.locks().lock(located.auditorium_id).await;
            let uow = self.store.begin().await?;

            let entity = fetch::<projection::Entity, _>(uow.conn(), Root::Projection, id).await?;
            let removed = cascade::delete(uow.conn(), Root::Projection, id).await?;

            uow.commit().await?;
            info!(projection_id = id, "projection deleted");
            Ok(Deleted { entity: entity.try_into()?, removed })
        })
        .await
    }

    pub async fn delete_movie(&self, id: i32) -> BookingResult<Deleted<movie::Model>> {
        self.delete_root::<movie::Entity>("delete_movie", Root::Movie, id).await
    }

    pub async fn delete_user(&self, id: i32) -> BookingResult<Deleted<user::Model>> {
        self.delete_root::<user::Entity>("delete_user", Root::User, id).await
    }

    pub async fn delete_tag(&self, id: i32) -> BookingResult<Deleted<tag::Model>> {
        self.delete_root::<tag::Entity>("delete_tag", Root::Tag, id).await
    }

    /// Cascade for roots whose subtree touches no auditorium schedule check.
    async fn delete_root<E>(
        &self,
        op: &'static str,
        root: Root,
        id: i32,
    ) -> BookingResult<Deleted<E::Model>>
    where
        E: EntityTrait,
        i32: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        traced(op, async {
            let uow = self.store.begin().await?;
            let entity = fetch::<E, _>(uow.conn(), root, id).await?;
            let removed = cascade::delete(uow.conn(), root, id).await?;
            uow.commit().await?;
            info!(root = root.name(), id, removed = ?removed.removed, "deleted");
            Ok(Deleted { entity, removed })
        })
        .await
    }

    pub async fn create_movie(&self, req: &NewMovie) -> BookingResult<movie::Model> {
        traced("create_movie", async {
            let title = required_name("movie", &req.title)?;
            let uow = self.store.begin().await?;
            let created = movie::ActiveModel {
                title: Set(title),
                year: Set(req.year),
                rating: Set(req.rating),
                current: Set(req.current),
                banner_url: Set(req.banner_url.clone()),
                ..Default::default()
            }
            .insert(uow.conn())
            .await?;
            uow.commit().await?;
            info!(movie_id = created.id, "movie created");
            Ok(created)
        })
        .await
    }

    pub async fn update_movie(&self, id: i32, req: &MovieUpdate) -> BookingResult<movie::Model> {
        traced("update_movie", async {
            let title = req.title.as_deref().map(|t| required_name("movie", t)).transpose()?;
            let uow = self.store.begin().await?;
            let found = fetch::<movie::Entity, _>(uow.conn(), Root::Movie, id).await?;

            let mut active: movie::ActiveModel = found.into();
            if let Some(title) = title {
                active.title = Set(title);
            }
            if let Some(year) = req.year {
                active.year = Set(year);
            }
            if let Some(rating) = req.rating {
                active.rating = Set(Some(rating));
            }
            if let Some(current) = req.current {
                active.current = Set(current);
            }
            if let Some(banner_url) = &req.banner_url {
                active.banner_url = Set(Some(banner_url.clone()));
            }
            let updated = active.update(uow.conn()).await?;
            uow.commit().await?;
            info!(movie_id = id, "movie updated");
            Ok(updated)
        })
        .await
    }

    /// Movies flagged as currently showing, by title.
    pub async fn current_movies(&self) -> BookingResult<Vec<movie::Model>> {
        Ok(movie::Entity::find()
            .filter(movie::Column::Current.eq(true))
            .order_by_asc(movie::Column::Title)
            .order_by_asc(movie::Column::Id)
            .all(self.store.db())
            .await?)
    }

    pub async fn create_user(&self, req: &NewUser) -> BookingResult<user::Model> {
        traced("create_user", async {
            let user_name = required_name("user", &req.user_name)?;
            let uow = self.store.begin().await?;

            let taken = user::Entity::find()
                .filter(user::Column::UserName.eq(&user_name))
                .one(uow.conn())
                .await?;
            if taken.is_some() {
                return Err(BookingError::NameCollision { entity: "user", name: user_name });
            }

            let created = user::ActiveModel {
                first_name: Set(req.first_name.trim().to_string()),
                last_name: Set(req.last_name.trim().to_string()),
                user_name: Set(user_name),
                is_admin: Set(false),
                is_super_user: Set(false),
                is_user: Set(true),
                bonus_points: Set(0),
                ..Default::default()
            }
            .insert(uow.conn())
            .await?;
            uow.commit().await?;
            info!(user_id = created.id, "user created");
            Ok(created)
        })
        .await
    }

    /// Returns the existing tag when one already carries `name`.
    pub async fn create_tag(&self, name: &str) -> BookingResult<tag::Model> {
        traced("create_tag", async {
            let name = required_name("tag", name)?;
            let uow = self.store.begin().await?;

            if let Some(existing) =
                tag::Entity::find().filter(tag::Column::Name.eq(&name)).one(uow.conn()).await?
            {
                return Ok(existing);
            }

            let active = tag::ActiveModel { name: Set(name), ..Default::default() };
            let created = active.insert(uow.conn()).await?;
            uow.commit().await?;
            info!(tag_id = created.id, "tag created");
            Ok(created)
        })
        .await
    }

    pub async fn tag_movie(&self, movie_id: i32, tag_id: i32) -> BookingResult<movie_tag::Model> {
        traced("tag_movie", async {
            let uow = self.store.begin().await?;
            fetch::<movie::Entity, _>(uow.conn(), Root::Movie, movie_id).await?;
            fetch::<tag::Entity, _>(uow.conn(), Root::Tag, tag_id).await?;

            let link = movie_tag::Model { movie_id, tag_id };
            if movie_tag::Entity::find_by_id((movie_id, tag_id)).one(uow.conn()).await?.is_some() {
                return Ok(link);
            }

            let active = movie_tag::ActiveModel { movie_id: Set(movie_id), tag_id: Set(tag_id) };
            movie_tag::Entity::insert(active).exec_without_returning(uow.conn()).await?;
            uow.commit().await?;
            info!(movie_id, tag_id, "movie tagged");
            Ok(link)
        })
        .await
    }

    /// Schedules a projection unless it starts in the past or another
    /// projection in the same auditorium starts within the conflict window.
    pub async fn create_projection(&self, req: &NewProjection) -> BookingResult<ProjectionView> {
        traced("create_projection", async {
            let starts_at = upcoming_start(req.starts_at)?;

            let _guard = self.store.locks().lock(req.auditorium_id).await;
            let uow = self.store.begin().await?;

            let conn = uow.conn();

            fetch::<auditorium::Entity, _>(conn, Root::Auditorium, req.auditorium_id).await?;
            fetch::<movie::Entity, _>(conn, Root::Movie, req.movie_id).await?;
            self.check_schedule(conn, req.auditorium_id, starts_at, None).await?;

            let created = projection::ActiveModel {
                movie_id: Set(req.movie_id),
                auditorium_id: Set(req.auditorium_id),
                starts_at: Set(starts_at.as_second()),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            uow.commit().await?;
            info!(
                projection_id = created.id,
                auditorium_id = req.auditorium_id,
                %starts_at,
                "projection created"
            );
            created.try_into()
        })
        .await
    }

    /// Moves a projection to a new start time, optionally with another
    /// movie. Its own current slot does not count as a conflict.
    pub async fn reschedule_projection(
        &self,
        id: i32,
        req: &Reschedule,
    ) -> BookingResult<ProjectionView> {
        traced("reschedule_projection", async {
            let starts_at = upcoming_start(req.starts_at)?;
            let db = self.store.db();
            let located = fetch::<projection::Entity, _>(db, Root::Projection, id).await?;
            let _guard = self.store.locks().lock(located.auditorium_id).await;
            let uow = self.store.begin().await?;

            let show = fetch::<projection::Entity, _>(uow.conn(), Root::Projection, id).await?;
            let movie_id = match req.movie_id {
                Some(movie_id) => {
                    fetch::<movie::Entity, _>(uow.conn(), Root::Movie, movie_id).await?.id
                },
                None => show.movie_id,
            };
            self.check_schedule(uow.conn(), show.auditorium_id, starts_at, Some(id)).await?;

            let mut active: projection::ActiveModel = show.into();
            active.starts_at = Set(starts_at.as_second());
            active.movie_id = Set(movie_id);
            let updated = active.update(uow.conn()).await?;
            uow.commit().await?;
            info!(projection_id = id, movie_id, %starts_at, "projection rescheduled");
            updated.try_into()
        })
        .await
    }

    pub async fn create_reservation(
        &self,
        req: &NewReservation,
    ) -> BookingResult<reservation::Model> {
        traced("create_reservation", async {
            let db = self.store.db();
            let located =
                fetch::<projection::Entity, _>(db, Root::Projection, req.projection_id).await?;
            let _guard = self.store.locks().lock(located.auditorium_id).await;
            let uow = self.store.begin().await?;
            let conn = uow.conn();

            let show = fetch::<projection::Entity, _>(conn, Root::Projection, req.projection_id)
                .await?;
            let seat = fetch::<seat::Entity, _>(conn, Root::Seat, req.seat_id).await?;
            fetch::<user::Entity, _>(conn, Root::User, req.user_id).await?;

            if seat.auditorium_id != show.auditorium_id {
                return Err(BookingError::Invalid(format!(
                    "seat {} is not in auditorium {} of projection {}",
                    seat.id, show.auditorium_id, show.id
                )));
            }

            let taken = reservation::Entity::find()
                .filter(reservation::Column::ProjectionId.eq(show.id))
                .filter(reservation::Column::SeatId.eq(seat.id))
                .one(conn)
                .await?;
            if taken.is_some() {
                return Err(BookingError::SeatTaken { projection_id: show.id, seat_id: seat.id });
            }

            let created = reservation::ActiveModel {
                projection_id: Set(show.id),
                seat_id: Set(seat.id),
                user_id: Set(req.user_id),
                payment: Set(req.payment),
                message: Set(req.message.clone()),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            uow.commit().await?;
            info!(
                reservation_id = created.id,
                projection_id = show.id,
                seat = ?Cell::new(seat.row, seat.number),
                "seat reserved"
            );
            Ok(created)
        })
        .await
    }

    pub async fn reservations_for_projection(
        &self,
        projection_id: i32,
    ) -> BookingResult<Vec<reservation::Model>> {
        let db = self.store.db();
        fetch::<projection::Entity, _>(db, Root::Projection, projection_id).await?;
        Ok(reservation::Entity::find()
            .filter(reservation::Column::ProjectionId.eq(projection_id))
            .order_by_asc(reservation::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn reservations_for_user(
        &self,
        user_id: i32,
    ) -> BookingResult<Vec<reservation::Model>> {
        let db = self.store.db();
        fetch::<user::Entity, _>(db, Root::User, user_id).await?;
        Ok(reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .order_by_asc(reservation::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn filter_projections(
        &self,
        filter: &ProjectionFilter,
    ) -> BookingResult<Vec<ProjectionView>> {
        use projection::Column as P;

        let mut query = projection::Entity::find();
        if let Some(cinema_id) = filter.cinema_id {
            query = query
                .inner_join(auditorium::Entity)
                .filter(auditorium::Column::CinemaId.eq(cinema_id));
        }
        if let Some(auditorium_id) = filter.auditorium_id {
            query = query.filter(P::AuditoriumId.eq(auditorium_id));
        }
        if let Some(movie_id) = filter.movie_id {
            query = query.filter(P::MovieId.eq(movie_id));
        }
        if let Some(date) = filter.date {
            let (start, end) = day_bounds(date)?;
            query = query.filter(P::StartsAt.gte(start)).filter(P::StartsAt.lt(end));
        }

        query
            .order_by_asc(P::StartsAt)
            .order_by_asc(P::Id)
            .all(self.store.db())
            .await?
            .into_iter()
            .map(ProjectionView::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use sea_orm::{ConnectionTrait, PaginatorTrait};

    use super::*;
    use crate::{cascade::Node, error::PROJECTIONS_AT_SAME_TIME, testing::Fixture};

    fn cell_ids(seats: &[seat::Model]) -> HashMap<(i32, i32), i32> {
        seats.iter().map(|s| ((s.row, s.number), s.id)).collect()
    }

    #[tokio::test]
    async fn growing_and_shrinking_back_keeps_original_seats() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(3, 4).await;
        let before = cell_ids(&hall.seats);

        let grown = fx.booking.resize_auditorium(hall.auditorium.id, 5, 5).await.unwrap();
        assert_eq!(grown.snapshot.seats.len(), 25);
        assert_eq!((grown.snapshot.rows, grown.snapshot.columns), (5, 5));

        let back = fx.booking.resize_auditorium(hall.auditorium.id, 3, 4).await.unwrap();
        assert_eq!(back.snapshot.seats.len(), before.len());
        assert_eq!(cell_ids(&back.snapshot.seats), before);
    }

    #[tokio::test]
    async fn shrinking_removes_edge_seats_and_their_reservations() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(3, 3).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let guest = fx.user("guest").await;
        let ids = cell_ids(&hall.seats);
        fx.reserve(show.id, ids[&(3, 3)], guest.id).await;
        fx.reserve(show.id, ids[&(1, 3)], guest.id).await;
        fx.reserve(show.id, ids[&(1, 1)], guest.id).await;

        let outcome = fx.booking.resize_auditorium(hall.auditorium.id, 2, 2).await.unwrap();

        assert_eq!(outcome.change.deleted, 5);
        assert_eq!(outcome.change.inserted, 0);
        assert_eq!(outcome.change.reservations_removed, 2);
        assert!(outcome.change.skipped.is_empty());
        let kept: Vec<_> = outcome.snapshot.seats.iter().map(|s| (s.row, s.number)).collect();
        assert_eq!(kept, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);

        let left = reservation::Entity::find().all(fx.store.db()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].seat_id, ids[&(1, 1)]);
    }

    #[tokio::test]
    async fn resize_reports_cells_without_a_seat() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(3, 3).await;
        let gap = hall.seats.iter().find(|s| s.row == 3 && s.number == 2).unwrap();
        seat::Entity::delete_by_id(gap.id).exec(fx.store.db()).await.unwrap();

        let outcome = fx.booking.resize_auditorium(hall.auditorium.id, 2, 3).await.unwrap();

        assert_eq!(outcome.change.deleted, 2);
        assert_eq!(outcome.change.skipped, vec![Cell::new(3, 2)]);
        assert_eq!(outcome.snapshot.seats.len(), 6);
    }

    #[tokio::test]
    async fn resize_of_missing_auditorium_is_not_found() {
        let fx = Fixture::new().await;
        let commits = fx.store.commits();

        let err = fx.booking.resize_auditorium(77, 2, 2).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(fx.store.commits(), commits);
    }

    #[tokio::test]
    async fn projection_exactly_one_window_apart_is_accepted() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 1).await;
        let film = fx.movie("Heat").await;
        let t = Fixture::in_hours(24);
        fx.schedule(hall.auditorium.id, film.id, t).await.unwrap();

        let id = hall.auditorium.id;
        let inside = fx.schedule(id, film.id, t + SignedDuration::from_mins(179)).await;
        let earlier = fx.schedule(id, film.id, t - SignedDuration::from_mins(179)).await;
        let boundary = fx.schedule(id, film.id, t + SignedDuration::from_hours(3)).await;

        let err = inside.unwrap_err();
        assert!(matches!(err, BookingError::ScheduleConflict));
        assert_eq!(err.to_string(), PROJECTIONS_AT_SAME_TIME);
        assert!(matches!(earlier, Err(BookingError::ScheduleConflict)));
        assert_eq!(boundary.unwrap().starts_at, t + SignedDuration::from_hours(3));
    }

    #[tokio::test]
    async fn schedules_are_per_auditorium() {
        let fx = Fixture::new().await;
        let one = fx.auditorium(1, 1).await;
        let two = fx.auditorium(1, 1).await;
        let film = fx.movie("Ran").await;
        let t = Fixture::in_hours(48);

        fx.schedule(one.auditorium.id, film.id, t).await.unwrap();
        fx.schedule(two.auditorium.id, film.id, t).await.unwrap();
    }

    #[tokio::test]
    async fn projection_in_the_past_is_rejected() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 1).await;
        let film = fx.movie("Alien").await;

        let err =
            fx.schedule(hall.auditorium.id, film.id, Fixture::in_hours(-1)).await.unwrap_err();

        assert!(matches!(&err, BookingError::Invalid(msg) if msg == PROJECTION_IN_PAST));
    }

    #[tokio::test]
    async fn projection_needs_existing_auditorium_and_movie() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 1).await;
        let film = fx.movie("Solaris").await;
        let t = Fixture::in_hours(5);

        let no_hall = fx.schedule(999, film.id, t).await.unwrap_err();
        let no_film = fx.schedule(hall.auditorium.id, 999, t).await.unwrap_err();

        assert!(matches!(no_hall, BookingError::NotFound { entity: "auditorium", id: 999 }));
        assert!(matches!(no_film, BookingError::NotFound { entity: "movie", id: 999 }));
    }

    /// Runs both futures on their own tasks so they can interleave across
    /// pooled connections.
    async fn race<A, B>(a: A, b: B) -> (A::Output, B::Output)
    where
        A: Future + Send + 'static,
        A::Output: Send + 'static,
        B: Future + Send + 'static,
        B::Output: Send + 'static,
    {
        let (a, b) = tokio::join!(tokio::spawn(a), tokio::spawn(b));
        (a.unwrap(), b.unwrap())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_projections_in_one_auditorium_admit_exactly_one() {
        let fx = Fixture::on_disk(4).await;
        let film = fx.movie("Ikiru").await;

        for round in 0..8 {
            let hall = fx.auditorium(1, 1).await;
            let t = Fixture::in_hours(30);
            let hall_id = hall.auditorium.id;
            let first = NewProjection { auditorium_id: hall_id, movie_id: film.id, starts_at: t };
            let second = NewProjection { starts_at: t + SignedDuration::from_mins(30), ..first };
            let (a, b) = (fx.booking.clone(), fx.booking.clone());

            let (a, b) = race(
                async move { a.create_projection(&first).await },
                async move { b.create_projection(&second).await },
            )
            .await;

            let (won, lost): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(Result::is_ok);
            assert_eq!(won.len(), 1, "round {round}");
            assert!(
                matches!(&lost[0], Err(BookingError::ScheduleConflict)),
                "round {round}: {:?}",
                lost[0]
            );
            let filter = ProjectionFilter { auditorium_id: Some(hall_id), ..Default::default() };
            assert_eq!(fx.booking.filter_projections(&filter).await.unwrap().len(), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_resize_and_reservation_never_strand_a_booking() {
        let fx = Fixture::on_disk(4).await;
        let guest = fx.user("guest").await;

        for round in 0..8 {
            let hall = fx.auditorium(3, 3).await;
            let show = fx.projection(hall.auditorium.id, 24).await;
            let corner = cell_ids(&hall.seats)[&(3, 3)];
            let req = NewReservation {
                projection_id: show.id,
                seat_id: corner,
                user_id: guest.id,
                payment: false,
                message: None,
            };
            let (resizer, booker) = (fx.booking.clone(), fx.booking.clone());
            let hall_id = hall.auditorium.id;

            let (resized, reserved) = race(
                async move { resizer.resize_auditorium(hall_id, 2, 2).await },
                async move { booker.create_reservation(&req).await },
            )
            .await;

            let resized = resized.unwrap();
            match reserved {
                Ok(_) => assert_eq!(resized.change.reservations_removed, 1, "round {round}"),
                Err(err) => assert!(
                    matches!(err, BookingError::NotFound { entity: "seat", .. }),
                    "round {round}: {err}"
                ),
            }
            let left = fx.booking.reservations_for_projection(show.id).await.unwrap();
            assert!(left.is_empty(), "round {round}");
        }
    }

    #[tokio::test]
    async fn cinema_delete_covers_auditoriums_added_while_it_waits() {
        let fx = Fixture::new().await;
        let cinema = fx.booking.create_cinema("Metro").await.unwrap();
        let first = fx.auditorium_in(cinema.id, "One", 1, 1).await;
        let held_first = fx.store.locks().lock(first.auditorium.id).await;

        let booking = fx.booking.clone();
        let cinema_id = cinema.id;
        let deleting = tokio::spawn(async move { booking.delete_cinema(cinema_id).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = fx.auditorium_in(cinema.id, "Two", 1, 1).await;
        let held_second = fx.store.locks().lock(second.auditorium.id).await;
        drop(held_first);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!deleting.is_finished());
        assert_eq!(cinema::Entity::find().count(fx.store.db()).await.unwrap(), 1);

        drop(held_second);
        let deleted = deleting.await.unwrap().unwrap();
        assert_eq!(deleted.removed.count(Node::Auditorium), 2);
        assert_eq!(auditorium::Entity::find().count(fx.store.db()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_a_cinema_removes_everything_under_it_in_one_commit() {
        let fx = Fixture::new().await;
        let cinema = fx.booking.create_cinema("Odeon").await.unwrap();
        let guest = fx.user("guest").await;
        for name in ["Red", "Blue"] {
            let hall = fx.auditorium_in(cinema.id, name, 2, 2).await;
            let show = fx.projection(hall.auditorium.id, 24).await;
            fx.reserve(show.id, hall.seats[0].id, guest.id).await;
        }
        let commits = fx.store.commits();

        let deleted = fx.booking.delete_cinema(cinema.id).await.unwrap();

        assert_eq!(fx.store.commits(), commits + 1);
        assert_eq!(deleted.entity, cinema);
        assert_eq!(deleted.removed.count(Node::Auditorium), 2);
        assert_eq!(deleted.removed.count(Node::Seat), 8);
        assert_eq!(deleted.removed.count(Node::Projection), 2);
        assert_eq!(deleted.removed.count(Node::Reservation), 2);
        let db = fx.store.db();
        assert_eq!(cinema::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(auditorium::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(seat::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(projection::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(reservation::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(user::Entity::find().count(db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_seat_delete_aborts_the_whole_cinema_delete() {
        let fx = Fixture::new().await;
        let cinema = fx.booking.create_cinema("Rex").await.unwrap();
        let guest = fx.user("guest").await;
        let first = fx.auditorium_in(cinema.id, "One", 2, 2).await;
        let second = fx.auditorium_in(cinema.id, "Two", 2, 2).await;
        for hall in [&first, &second] {
            let show = fx.projection(hall.auditorium.id, 24).await;
            fx.reserve(show.id, hall.seats[0].id, guest.id).await;
        }
        fx.store
            .db()
            .execute_unprepared(&format!(
                "CREATE TRIGGER fail_seat_delete BEFORE DELETE ON seat \
                 WHEN OLD.auditorium_id = {} \
                 BEGIN SELECT RAISE(ABORT, 'simulated store failure'); END",
                second.auditorium.id
            ))
            .await
            .unwrap();
        let commits = fx.store.commits();

        let err = fx.booking.delete_cinema(cinema.id).await.unwrap_err();

        assert!(matches!(err, BookingError::Store(_)));
        assert_eq!(fx.store.commits(), commits);
        let db = fx.store.db();
        assert_eq!(cinema::Entity::find().count(db).await.unwrap(), 1);
        assert_eq!(auditorium::Entity::find().count(db).await.unwrap(), 2);
        assert_eq!(seat::Entity::find().count(db).await.unwrap(), 8);
        assert_eq!(projection::Entity::find().count(db).await.unwrap(), 2);
        assert_eq!(reservation::Entity::find().count(db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn deleting_an_absent_auditorium_is_not_found_without_commit() {
        let fx = Fixture::new().await;
        fx.auditorium(2, 2).await;
        let commits = fx.store.commits();

        let err = fx.booking.delete_auditorium(4242).await.unwrap_err();

        assert!(matches!(err, BookingError::NotFound { entity: "auditorium", id: 4242 }));
        assert_eq!(fx.store.commits(), commits);
    }

    #[tokio::test]
    async fn deleting_an_auditorium_leaves_its_cinema() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(2, 3).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let guest = fx.user("guest").await;
        fx.reserve(show.id, hall.seats[4].id, guest.id).await;

        let deleted = fx.booking.delete_auditorium(hall.auditorium.id).await.unwrap();

        assert_eq!(deleted.removed.count(Node::Seat), 6);
        assert_eq!(deleted.removed.count(Node::Reservation), 1);
        assert_eq!(cinema::Entity::find().count(fx.store.db()).await.unwrap(), 1);
        assert!(fx.booking.get_auditorium(hall.auditorium.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn deleting_a_movie_removes_tags_projections_and_reservations() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 2).await;
        let film = fx.movie("Stalker").await;
        let other = fx.movie("Mirror").await;
        let tag = fx.booking.create_tag("classic").await.unwrap();
        fx.booking.tag_movie(film.id, tag.id).await.unwrap();
        fx.booking.tag_movie(other.id, tag.id).await.unwrap();
        let show = fx.schedule(hall.auditorium.id, film.id, Fixture::in_hours(10)).await.unwrap();
        let guest = fx.user("guest").await;
        fx.reserve(show.id, hall.seats[0].id, guest.id).await;

        let deleted = fx.booking.delete_movie(film.id).await.unwrap();

        assert_eq!(deleted.removed.count(Node::MovieTag), 1);
        assert_eq!(deleted.removed.count(Node::Projection), 1);
        assert_eq!(deleted.removed.count(Node::Reservation), 1);
        let db = fx.store.db();
        assert_eq!(movie_tag::Entity::find().count(db).await.unwrap(), 1);
        assert_eq!(tag::Entity::find().count(db).await.unwrap(), 1);
        assert_eq!(seat::Entity::find().count(db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn deleting_a_user_keeps_other_bookings() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 2).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let leaving = fx.user("leaving").await;
        let staying = fx.user("staying").await;
        fx.reserve(show.id, hall.seats[0].id, leaving.id).await;
        fx.reserve(show.id, hall.seats[1].id, staying.id).await;

        let deleted = fx.booking.delete_user(leaving.id).await.unwrap();

        assert_eq!(deleted.entity.user_name, "leaving");
        assert_eq!(deleted.removed.count(Node::Reservation), 1);
        assert_eq!(reservation::Entity::find().count(fx.store.db()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_a_seat_or_projection_frees_the_reservation() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 2).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let guest = fx.user("guest").await;
        fx.reserve(show.id, hall.seats[0].id, guest.id).await;
        fx.reserve(show.id, hall.seats[1].id, guest.id).await;

        let seat = fx.booking.delete_seat(hall.seats[0].id).await.unwrap();
        assert_eq!(seat.removed.count(Node::Reservation), 1);

        let show = fx.booking.delete_projection(show.id).await.unwrap();
        assert_eq!(show.removed.count(Node::Reservation), 1);
        assert_eq!(reservation::Entity::find().count(fx.store.db()).await.unwrap(), 0);
        assert!(fx.booking.delete_projection(show.entity.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn deleting_a_tag_unlinks_movies() {
        let fx = Fixture::new().await;
        let film = fx.movie("Paprika").await;
        let tag = fx.booking.create_tag("anime").await.unwrap();
        fx.booking.tag_movie(film.id, tag.id).await.unwrap();

        let deleted = fx.booking.delete_tag(tag.id).await.unwrap();

        assert_eq!(deleted.removed.count(Node::MovieTag), 1);
        assert_eq!(movie::Entity::find().count(fx.store.db()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cinema_names_are_unique() {
        let fx = Fixture::new().await;
        fx.booking.create_cinema("Roxy").await.unwrap();

        let err = fx.booking.create_cinema(" Roxy ").await.unwrap_err();

        assert!(matches!(err, BookingError::NameCollision { entity: "cinema", .. }));
        assert!(matches!(fx.booking.create_cinema("  ").await, Err(BookingError::Invalid(_))));
    }

    #[tokio::test]
    async fn auditorium_names_are_unique_per_cinema() {
        let fx = Fixture::new().await;
        let a = fx.booking.create_cinema("A").await.unwrap();
        let b = fx.booking.create_cinema("B").await.unwrap();
        fx.auditorium_in(a.id, "Main", 1, 1).await;

        let req = NewAuditorium { cinema_id: a.id, name: "Main".into(), rows: 1, columns: 1 };
        let clash = fx.booking.create_auditorium(&req).await.unwrap_err();
        assert!(matches!(clash, BookingError::NameCollision { entity: "auditorium", .. }));

        fx.auditorium_in(b.id, "Main", 1, 1).await;
    }

    #[tokio::test]
    async fn auditorium_needs_a_cinema_and_a_real_grid() {
        let fx = Fixture::new().await;
        let cinema = fx.booking.create_cinema("Plaza").await.unwrap();

        let orphan = NewAuditorium { cinema_id: 31, name: "X".into(), rows: 2, columns: 2 };
        let empty = NewAuditorium { cinema_id: cinema.id, rows: 0, ..orphan.clone() };

        let orphan = fx.booking.create_auditorium(&orphan).await.unwrap_err();
        let empty = fx.booking.create_auditorium(&empty).await.unwrap_err();

        assert!(orphan.is_not_found());
        assert!(matches!(empty, BookingError::Invalid(_)));
        assert_eq!(auditorium::Entity::find().count(fx.store.db()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cinema_with_auditorium_is_all_or_nothing() {
        let fx = Fixture::new().await;

        let created = fx
            .booking
            .create_cinema_with_auditorium(&NewCinemaWithAuditorium {
                cinema_name: "Lux".into(),
                auditorium_name: "Grand".into(),
                rows: 4,
                columns: 6,
            })
            .await
            .unwrap();
        assert_eq!(created.auditorium.seats.len(), 24);
        assert_eq!(created.auditorium.auditorium.cinema_id, created.cinema.id);

        let commits = fx.store.commits();
        let err = fx
            .booking
            .create_cinema_with_auditorium(&NewCinemaWithAuditorium {
                cinema_name: "Nova".into(),
                auditorium_name: "Grand".into(),
                rows: 0,
                columns: 6,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Invalid(_)));
        assert_eq!(fx.store.commits(), commits);
        assert_eq!(cinema::Entity::find().count(fx.store.db()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_auditorium_orders_seats_by_row_then_number() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(2, 3).await;

        let snapshot = fx.booking.get_auditorium(hall.auditorium.id).await.unwrap();

        let cells: Vec<_> = snapshot.seats.iter().map(|s| (s.row, s.number)).collect();
        assert_eq!(cells, vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]);
    }

    #[tokio::test]
    async fn new_users_get_default_roles() {
        let fx = Fixture::new().await;
        let user = fx.user("ada").await;

        assert!(user.is_user);
        assert!(!user.is_admin);
        assert!(!user.is_super_user);
        assert_eq!(user.bonus_points, 0);

        let req =
            NewUser { first_name: "A".into(), last_name: "B".into(), user_name: "ada".into() };
        let dup = fx.booking.create_user(&req).await.unwrap_err();
        assert!(matches!(dup, BookingError::NameCollision { entity: "user", .. }));
    }

    #[tokio::test]
    async fn creating_a_known_tag_returns_it() {
        let fx = Fixture::new().await;
        let first = fx.booking.create_tag("noir").await.unwrap();
        let commits = fx.store.commits();

        let again = fx.booking.create_tag("noir").await.unwrap();

        assert_eq!(again, first);
        assert_eq!(fx.store.commits(), commits);
    }

    #[tokio::test]
    async fn tagging_twice_keeps_one_link() {
        let fx = Fixture::new().await;
        let film = fx.movie("Brazil").await;
        let tag = fx.booking.create_tag("satire").await.unwrap();

        fx.booking.tag_movie(film.id, tag.id).await.unwrap();
        fx.booking.tag_movie(film.id, tag.id).await.unwrap();

        assert_eq!(movie_tag::Entity::find().count(fx.store.db()).await.unwrap(), 1);
        assert!(fx.booking.tag_movie(film.id, 99).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn a_seat_is_reserved_once_per_projection() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 1).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let later = fx.projection(hall.auditorium.id, 30).await;
        let guest = fx.user("guest").await;
        let seat = hall.seats[0].id;
        fx.reserve(show.id, seat, guest.id).await;

        let again = fx
            .booking
            .create_reservation(&NewReservation {
                projection_id: show.id,
                seat_id: seat,
                user_id: guest.id,
                payment: true,
                message: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(again, BookingError::SeatTaken { .. }));

        fx.reserve(later.id, seat, guest.id).await;
    }

    #[tokio::test]
    async fn reserved_seat_must_be_in_the_projection_auditorium() {
        let fx = Fixture::new().await;
        let here = fx.auditorium(1, 1).await;
        let there = fx.auditorium(1, 1).await;
        let show = fx.projection(here.auditorium.id, 24).await;
        let guest = fx.user("guest").await;

        let err = fx
            .booking
            .create_reservation(&NewReservation {
                projection_id: show.id,
                seat_id: there.seats[0].id,
                user_id: guest.id,
                payment: false,
                message: Some("aisle please".into()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Invalid(_)));
    }

    #[tokio::test]
    async fn filters_combine_and_match_the_utc_day() {
        let fx = Fixture::new().await;
        let north = fx.booking.create_cinema("North").await.unwrap();
        let south = fx.booking.create_cinema("South").await.unwrap();
        let n1 = fx.auditorium_in(north.id, "1", 1, 1).await;
        let s1 = fx.auditorium_in(south.id, "1", 1, 1).await;
        let film = fx.movie("Vertigo").await;
        let other = fx.movie("Psycho").await;
        let day: Timestamp = "2099-03-01T10:00:00Z".parse().unwrap();
        let next_day: Timestamp = "2099-03-02T10:00:00Z".parse().unwrap();

        let a = fx.schedule(n1.auditorium.id, film.id, day).await.unwrap();
        let b = fx.schedule(n1.auditorium.id, other.id, next_day).await.unwrap();
        let c = fx.schedule(s1.auditorium.id, film.id, day).await.unwrap();

        let all = fx.booking.filter_projections(&ProjectionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let in_north = ProjectionFilter { cinema_id: Some(north.id), ..Default::default() };
        let in_north = fx.booking.filter_projections(&in_north).await.unwrap();
        assert_eq!(in_north, vec![a.clone(), b.clone()]);

        let march_first = Some(jiff::civil::date(2099, 3, 1));
        let first_day = fx
            .booking
            .filter_projections(&ProjectionFilter { date: march_first, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(first_day.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a.id, c.id]);

        let narrow = fx
            .booking
            .filter_projections(&ProjectionFilter {
                cinema_id: Some(north.id),
                movie_id: Some(film.id),
                date: march_first,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(narrow, vec![a]);

        let by_hall =
            ProjectionFilter { auditorium_id: Some(s1.auditorium.id), ..Default::default() };
        let by_hall = fx.booking.filter_projections(&by_hall).await.unwrap();
        assert_eq!(by_hall, vec![c]);
    }

    #[tokio::test]
    async fn renaming_a_cinema_checks_other_names() {
        let fx = Fixture::new().await;
        let roxy = fx.booking.create_cinema("Roxy").await.unwrap();
        fx.booking.create_cinema("Ritz").await.unwrap();

        let same = fx.booking.update_cinema(roxy.id, "Roxy").await.unwrap();
        let renamed = fx.booking.update_cinema(roxy.id, " Regal ").await.unwrap();
        let commits = fx.store.commits();
        let clash = fx.booking.update_cinema(roxy.id, "Ritz").await.unwrap_err();
        let missing = fx.booking.update_cinema(404, "Elsewhere").await.unwrap_err();

        assert_eq!(same, roxy);
        assert_eq!(renamed.name, "Regal");
        assert!(matches!(clash, BookingError::NameCollision { entity: "cinema", .. }));
        assert!(matches!(missing, BookingError::NotFound { entity: "cinema", id: 404 }));
        let blank = fx.booking.update_cinema(roxy.id, "").await;
        assert!(matches!(blank, Err(BookingError::Invalid(_))));
        assert_eq!(fx.store.commits(), commits);
    }

    #[tokio::test]
    async fn rescheduling_keeps_the_window_against_other_projections() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 1).await;
        let film = fx.movie("Playtime").await;
        let t = Fixture::in_hours(24);
        let fixed = fx.schedule(hall.auditorium.id, film.id, t).await.unwrap();
        let later = t + SignedDuration::from_hours(5);
        let moving = fx.schedule(hall.auditorium.id, film.id, later).await.unwrap();
        let to = |starts_at| Reschedule { starts_at, movie_id: None };
        let commits = fx.store.commits();

        let inside = to(t + SignedDuration::from_mins(179));
        let err = fx.booking.reschedule_projection(moving.id, &inside).await.unwrap_err();
        assert!(matches!(err, BookingError::ScheduleConflict));
        assert_eq!(fx.store.commits(), commits);

        let boundary = t + SignedDuration::from_hours(3);
        let moved = fx.booking.reschedule_projection(moving.id, &to(boundary)).await.unwrap();
        assert_eq!(moved.starts_at, boundary);
        assert_eq!(moved.auditorium_id, hall.auditorium.id);

        let nudged = t - SignedDuration::from_mins(30);
        let own_slot = fx.booking.reschedule_projection(fixed.id, &to(nudged)).await.unwrap();
        assert_eq!(own_slot.starts_at, nudged);
    }

    #[tokio::test]
    async fn rescheduling_validates_time_movie_and_projection() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 1).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let guest = fx.user("guest").await;
        fx.reserve(show.id, hall.seats[0].id, guest.id).await;
        let later = Fixture::in_hours(48);

        let past = Reschedule { starts_at: Fixture::in_hours(-2), movie_id: None };
        let past = fx.booking.reschedule_projection(show.id, &past).await.unwrap_err();
        let no_film = Reschedule { starts_at: later, movie_id: Some(999) };
        let no_film = fx.booking.reschedule_projection(show.id, &no_film).await.unwrap_err();
        let gone = Reschedule { starts_at: later, movie_id: None };
        let gone = fx.booking.reschedule_projection(404, &gone).await.unwrap_err();

        assert!(matches!(&past, BookingError::Invalid(msg) if msg == PROJECTION_IN_PAST));
        assert!(matches!(no_film, BookingError::NotFound { entity: "movie", id: 999 }));
        assert!(matches!(gone, BookingError::NotFound { entity: "projection", id: 404 }));

        let film = fx.movie("Mon Oncle").await;
        let swap = Reschedule { starts_at: later, movie_id: Some(film.id) };
        let moved = fx.booking.reschedule_projection(show.id, &swap).await.unwrap();
        assert_eq!((moved.movie_id, moved.starts_at), (film.id, later));
        assert_eq!(fx.booking.reservations_for_projection(show.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn movie_updates_touch_only_given_fields() {
        let fx = Fixture::new().await;
        let film = fx.movie("Tampopo").await;

        let update = MovieUpdate { rating: Some(9.0), current: Some(false), ..Default::default() };
        let updated = fx.booking.update_movie(film.id, &update).await.unwrap();

        assert_eq!(updated.title, "Tampopo");
        assert_eq!(updated.year, film.year);
        assert_eq!(updated.rating, Some(9.0));
        assert!(!updated.current);

        let blank = MovieUpdate { title: Some(" ".into()), ..Default::default() };
        let blank = fx.booking.update_movie(film.id, &blank).await.unwrap_err();
        assert!(matches!(blank, BookingError::Invalid(_)));
        let missing = fx.booking.update_movie(404, &MovieUpdate::default()).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn current_movies_are_listed_by_title() {
        let fx = Fixture::new().await;
        let zelig = fx.movie("Zelig").await;
        let annie = fx.movie("Annie Hall").await;
        let retired = fx.movie("Manhattan").await;
        let off = MovieUpdate { current: Some(false), ..Default::default() };
        fx.booking.update_movie(retired.id, &off).await.unwrap();

        let current = fx.booking.current_movies().await.unwrap();

        assert_eq!(current.iter().map(|m| m.id).collect::<Vec<_>>(), vec![annie.id, zelig.id]);
    }

    #[tokio::test]
    async fn reservations_are_listed_per_projection_and_per_user() {
        let fx = Fixture::new().await;
        let hall = fx.auditorium(1, 3).await;
        let show = fx.projection(hall.auditorium.id, 24).await;
        let later = fx.projection(hall.auditorium.id, 30).await;
        let ann = fx.user("ann").await;
        let bob = fx.user("bob").await;
        let a1 = fx.reserve(show.id, hall.seats[0].id, ann.id).await;
        let b1 = fx.reserve(show.id, hall.seats[1].id, bob.id).await;
        let a2 = fx.reserve(later.id, hall.seats[2].id, ann.id).await;

        let for_show = fx.booking.reservations_for_projection(show.id).await.unwrap();
        let for_ann = fx.booking.reservations_for_user(ann.id).await.unwrap();

        assert_eq!(for_show, vec![a1.clone(), b1]);
        assert_eq!(for_ann, vec![a1, a2]);
        assert!(fx.booking.reservations_for_projection(404).await.unwrap_err().is_not_found());
        assert!(fx.booking.reservations_for_user(404).await.unwrap_err().is_not_found());
    }
}
