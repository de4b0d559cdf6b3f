//! Deletion of an entity together with everything that depends on it.
//!
//! Ownership is a tree: cinema > auditorium > {seat, projection} >
//! reservation, movie > {movie tag, projection}, user > reservation and
//! tag > movie tag. The schema's foreign keys are all required and
//! restrictive, so a row can only go once its dependents are gone.
//! [`delete`] walks the tree depth first from any [`Root`], removing leaves
//! before their parents, and stages everything on the caller's connection.
//! The caller commits once or drops the transaction.

use std::collections::BTreeMap;

use futures::{FutureExt, future::BoxFuture};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use serde::Serialize;
use tracing::debug;

use crate::{
    entities::{auditorium, cinema, movie, movie_tag, projection, reservation, seat, tag, user},
    error::{BookingError, BookingResult},
};

/// Every kind of row a cascade can remove.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Cinema,
    Auditorium,
    Seat,
    Projection,
    Reservation,
    Movie,
    MovieTag,
    User,
    Tag,
}

impl Node {
    pub fn name(self) -> &'static str {
        match self {
            Node::Cinema => "cinema",
            Node::Auditorium => "auditorium",
            Node::Seat => "seat",
            Node::Projection => "projection",
            Node::Reservation => "reservation",
            Node::Movie => "movie",
            Node::MovieTag => "movie tag",
            Node::User => "user",
            Node::Tag => "tag",
        }
    }
}

/// Rows addressed by a single id, the only ones a cascade can start from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Root {
    Cinema,
    Auditorium,
    Seat,
    Projection,
    Movie,
    User,
    Tag,
}

impl Root {
    pub fn node(self) -> Node {
        match self {
            Root::Cinema => Node::Cinema,
            Root::Auditorium => Node::Auditorium,
            Root::Seat => Node::Seat,
            Root::Projection => Node::Projection,
            Root::Movie => Node::Movie,
            Root::User => Node::User,
            Root::Tag => Node::Tag,
        }
    }

    pub fn name(self) -> &'static str {
        self.node().name()
    }

    /// Dependents without dependents of their own, removed in one statement.
    fn leaves(self) -> &'static [Leaf] {
        match self {
            Root::Seat => &[Leaf::ReservationOfSeat],
            Root::Projection => &[Leaf::ReservationOfProjection],
            Root::Movie => &[Leaf::MovieTagOfMovie],
            Root::User => &[Leaf::ReservationOfUser],
            Root::Tag => &[Leaf::MovieTagOfTag],
            Root::Cinema | Root::Auditorium => &[],
        }
    }

    /// Dependents that own rows themselves, walked one by one.
    fn branches(self) -> &'static [Branch] {
        match self {
            Root::Cinema => &[Branch::AuditoriumOfCinema],
            Root::Auditorium => &[Branch::ProjectionOfAuditorium, Branch::SeatOfAuditorium],
            Root::Movie => &[Branch::ProjectionOfMovie],
            Root::Seat | Root::Projection | Root::User | Root::Tag => &[],
        }
    }

    async fn delete_row<C: ConnectionTrait>(self, conn: &C, id: i32) -> BookingResult<u64> {
        let result = match self {
            Root::Cinema => cinema::Entity::delete_by_id(id).exec(conn).await?,
            Root::Auditorium => auditorium::Entity::delete_by_id(id).exec(conn).await?,
            Root::Seat => seat::Entity::delete_by_id(id).exec(conn).await?,
            Root::Projection => projection::Entity::delete_by_id(id).exec(conn).await?,
            Root::Movie => movie::Entity::delete_by_id(id).exec(conn).await?,
            Root::User => user::Entity::delete_by_id(id).exec(conn).await?,
            Root::Tag => tag::Entity::delete_by_id(id).exec(conn).await?,
        };
        Ok(result.rows_affected)
    }
}

/// A required foreign key from a leaf table to its owner.
#[derive(Clone, Copy, Debug)]
enum Leaf {
    ReservationOfProjection,
    ReservationOfSeat,
    ReservationOfUser,
    MovieTagOfMovie,
    MovieTagOfTag,
}

impl Leaf {
    fn node(self) -> Node {
        match self {
            Leaf::ReservationOfProjection | Leaf::ReservationOfSeat | Leaf::ReservationOfUser => {
                Node::Reservation
            },
            Leaf::MovieTagOfMovie | Leaf::MovieTagOfTag => Node::MovieTag,
        }
    }

    async fn delete_all<C: ConnectionTrait>(self, conn: &C, owner: i32) -> BookingResult<u64> {
        use reservation::Column as R;
        match self {
            Leaf::ReservationOfProjection => {
                delete_where::<reservation::Entity, _>(conn, R::ProjectionId, owner).await
            },
            Leaf::ReservationOfSeat => {
                delete_where::<reservation::Entity, _>(conn, R::SeatId, owner).await
            },
            Leaf::ReservationOfUser => {
                delete_where::<reservation::Entity, _>(conn, R::UserId, owner).await
            },
            Leaf::MovieTagOfMovie => {
                delete_where::<movie_tag::Entity, _>(conn, movie_tag::Column::MovieId, owner).await
            },
            Leaf::MovieTagOfTag => {
                delete_where::<movie_tag::Entity, _>(conn, movie_tag::Column::TagId, owner).await
            },
        }
    }
}

/// A required foreign key from a table whose rows own further rows.
#[derive(Clone, Copy, Debug)]
enum Branch {
    AuditoriumOfCinema,
    ProjectionOfAuditorium,
    SeatOfAuditorium,
    ProjectionOfMovie,
}

impl Branch {
    fn child(self) -> Root {
        match self {
            Branch::AuditoriumOfCinema => Root::Auditorium,
            Branch::ProjectionOfAuditorium | Branch::ProjectionOfMovie => Root::Projection,
            Branch::SeatOfAuditorium => Root::Seat,
        }
    }

    async fn child_ids<C: ConnectionTrait>(self, conn: &C, owner: i32) -> BookingResult<Vec<i32>> {
        use projection::Column as P;
        match self {
            Branch::AuditoriumOfCinema => {
                use auditorium::Column as A;
                ids_where::<auditorium::Entity, _>(conn, A::Id, A::CinemaId, owner).await
            },
            Branch::ProjectionOfAuditorium => {
                ids_where::<projection::Entity, _>(conn, P::Id, P::AuditoriumId, owner).await
            },
            Branch::ProjectionOfMovie => {
                ids_where::<projection::Entity, _>(conn, P::Id, P::MovieId, owner).await
            },
            Branch::SeatOfAuditorium => {
                use seat::Column as S;
                ids_where::<seat::Entity, _>(conn, S::Id, S::AuditoriumId, owner).await
            },
        }
    }
}

async fn ids_where<E, C>(
    conn: &C,
    id: E::Column,
    owner_column: E::Column,
    owner: i32,
) -> BookingResult<Vec<i32>>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    Ok(E::find()
        .select_only()
        .column(id)
        .filter(owner_column.eq(owner))
        .into_tuple::<i32>()
        .all(conn)
        .await?)
}

async fn delete_where<E, C>(conn: &C, owner_column: E::Column, owner: i32) -> BookingResult<u64>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    Ok(E::delete_many().filter(owner_column.eq(owner)).exec(conn).await?.rows_affected)
}

/// Rows removed by one cascade, per entity kind. The root is counted too.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub removed: BTreeMap<Node, u64>,
}

impl CascadeReport {
    pub fn count(&self, node: Node) -> u64 {
        self.removed.get(&node).copied().unwrap_or(0)
    }

    fn record(&mut self, node: Node, rows: u64) {
        if rows > 0 {
            *self.removed.entry(node).or_default() += rows;
        }
    }
}

/// Deletes `root` and all of its descendants on `conn`.
///
/// Fails with `NotFound` when the root row does not exist, and with
/// `Store` on any database error. Nothing here commits; on failure the
/// caller drops its transaction and every staged delete is discarded.
pub async fn delete<C: ConnectionTrait>(
    conn: &C,
    root: Root,
    id: i32,
) -> BookingResult<CascadeReport> {
    let mut report = CascadeReport::default();
    walk(conn, root, id, &mut report).await?;
    debug!(root = root.name(), id, removed = ?report.removed, "cascade staged");
    Ok(report)
}

fn walk<'a, C: ConnectionTrait>(
    conn: &'a C,
    root: Root,
    id: i32,
    report: &'a mut CascadeReport,
) -> BoxFuture<'a, BookingResult<()>> {
    async move {
        for leaf in root.leaves() {
            let rows = leaf.delete_all(conn, id).await?;
            report.record(leaf.node(), rows);
        }

        for branch in root.branches() {
            let child = branch.child();
            let ids = branch.child_ids(conn, id).await?;
            debug!(
                parent = root.name(),
                parent_id = id,
                child = child.name(),
                count = ids.len(),
                "dependents fetched"
            );
            for child_id in ids {
                walk(conn, child, child_id, report).await?;
            }
        }

        let rows = root.delete_row(conn, id).await?;
        if rows == 0 {
            return Err(BookingError::not_found(root.name(), id));
        }
        report.record(root.node(), rows);
        Ok(())
    }
    .boxed()
}
