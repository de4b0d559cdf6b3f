use std::collections::BTreeMap;

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    cascade::{self, Node, Root},
    entities::seat,
    error::{BookingError, BookingResult},
};

const INSERT_CHUNK: usize = 200;

/// Largest grid an auditorium may have, in seats.
pub const MAX_GRID_CELLS: i64 = 10_000;

/// A `(row, number)` coordinate in an auditorium's seat grid. Both are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Cell {
    pub row: i32,
    pub number: i32,
}

impl Cell {
    pub fn new(row: i32, number: i32) -> Self {
        Self { row, number }
    }

    fn of(seat: &seat::Model) -> Self {
        Self::new(seat.row, seat.number)
    }
}

/// How a seat list must change to reach a new extent. The three seat sets
/// are disjoint; `skipped` lists cells that were due for removal but had no
/// seat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridPlan {
    pub unchanged: Vec<seat::Model>,
    pub to_insert: Vec<Cell>,
    pub to_delete: Vec<seat::Model>,
    pub skipped: Vec<Cell>,
}

/// Result of applying a [`GridPlan`] inside a unit of work.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GridChange {
    pub inserted: usize,
    pub deleted: usize,
    pub reservations_removed: u64,
    pub skipped: Vec<Cell>,
}

enum Slot {
    Existing(seat::Model),
    New,
}

/// Current `(rows, columns)` extent: the largest row and number present.
/// An auditorium without seats has extent `(0, 0)`.
pub fn extent(seats: &[seat::Model]) -> (i32, i32) {
    seats.iter().fold((0, 0), |(rows, columns), s| (rows.max(s.row), columns.max(s.number)))
}

/// Every cell of a full `rows × columns` grid, row by row.
pub fn full_grid(rows: i32, columns: i32) -> BookingResult<Vec<Cell>> {
    validate_extent(rows, columns)?;
    Ok((1..=rows).flat_map(|row| (1..=columns).map(move |number| Cell::new(row, number))).collect())
}

/// Plans the move from the seats' current extent to `target_rows ×
/// target_columns`. Rows are adjusted completely before columns, and the
/// column pass walks the row range left by the row pass. Seats that stay
/// inside the new extent keep their identity.
pub fn plan_resize(
    seats: Vec<seat::Model>,
    target_rows: i32,
    target_columns: i32,
) -> BookingResult<GridPlan> {
    validate_extent(target_rows, target_columns)?;

    let (max_row, max_column) = extent(&seats);
    let mut grid: BTreeMap<Cell, Slot> =
        seats.into_iter().map(|s| (Cell::of(&s), Slot::Existing(s))).collect();
    let mut to_delete = Vec::new();
    let mut skipped = Vec::new();

    let row_delta = target_rows - max_row;
    if row_delta > 0 {
        for row in max_row + 1..=target_rows {
            for number in 1..=max_column {
                grid.insert(Cell::new(row, number), Slot::New);
            }
        }
    } else if row_delta < 0 {
        for row in (target_rows + 1..=max_row).rev() {
            for number in 1..=max_column {
                take(&mut grid, Cell::new(row, number), &mut to_delete, &mut skipped);
            }
        }
    }

    let max_row = if row_delta == 0 { max_row } else { target_rows };

    let column_delta = target_columns - max_column;
    if column_delta > 0 {
        for row in 1..=max_row {
            for number in max_column + 1..=target_columns {
                grid.insert(Cell::new(row, number), Slot::New);
            }
        }
    } else if column_delta < 0 {
        for row in 1..=max_row {
            for number in (target_columns + 1..=max_column).rev() {
                take(&mut grid, Cell::new(row, number), &mut to_delete, &mut skipped);
            }
        }
    }

    let mut plan = GridPlan { to_delete, skipped, ..GridPlan::default() };
    for (cell, slot) in grid {
        match slot {
            Slot::Existing(seat) => plan.unchanged.push(seat),
            Slot::New => plan.to_insert.push(cell),
        }
    }
    Ok(plan)
}

fn take(
    grid: &mut BTreeMap<Cell, Slot>,
    cell: Cell,
    to_delete: &mut Vec<seat::Model>,
    skipped: &mut Vec<Cell>,
) {
    match grid.remove(&cell) {
        Some(Slot::Existing(seat)) => to_delete.push(seat),
        // Added earlier in this plan, never stored.
        Some(Slot::New) => {},
        None => skipped.push(cell),
    }
}

fn validate_extent(rows: i32, columns: i32) -> BookingResult<()> {
    if rows < 1 || columns < 1 {
        return Err(BookingError::Invalid(format!(
            "seat grid needs at least one row and one column, got {rows}x{columns}"
        )));
    }
    if i64::from(rows) * i64::from(columns) > MAX_GRID_CELLS {
        return Err(BookingError::Invalid(format!(
            "seat grid {rows}x{columns} exceeds {MAX_GRID_CELLS} seats"
        )));
    }
    Ok(())
}

pub async fn load_seats<C: ConnectionTrait>(
    conn: &C,
    auditorium_id: i32,
) -> BookingResult<Vec<seat::Model>> {
    Ok(seat::Entity::find()
        .filter(seat::Column::AuditoriumId.eq(auditorium_id))
        .order_by_asc(seat::Column::Row)
        .order_by_asc(seat::Column::Number)
        .all(conn)
        .await?)
}

pub async fn insert_cells<C: ConnectionTrait>(
    conn: &C,
    auditorium_id: i32,
    cells: &[Cell],
) -> BookingResult<()> {
    for chunk in cells.chunks(INSERT_CHUNK) {
        let models = chunk.iter().map(|cell| seat::ActiveModel {
            id: Default::default(),
            auditorium_id: Set(auditorium_id),
            row: Set(cell.row),
            number: Set(cell.number),
        });
        seat::Entity::insert_many(models).exec(conn).await?;
    }
    Ok(())
}

/// Stages the plan: each removed seat goes through the seat cascade so its
/// reservations are deleted first, then the new cells are inserted.
pub async fn apply<C: ConnectionTrait>(
    conn: &C,
    auditorium_id: i32,
    plan: &GridPlan,
) -> BookingResult<GridChange> {
    let mut change = GridChange { skipped: plan.skipped.clone(), ..GridChange::default() };

    for cell in &plan.skipped {
        warn!(
            auditorium_id,
            row = cell.row,
            number = cell.number,
            "no seat at cell scheduled for removal"
        );
    }

    for seat in &plan.to_delete {
        let report = cascade::delete(conn, Root::Seat, seat.id).await?;
        change.reservations_removed += report.count(Node::Reservation);
        change.deleted += 1;
    }

    insert_cells(conn, auditorium_id, &plan.to_insert).await?;
    change.inserted = plan.to_insert.len();

    debug!(
        auditorium_id,
        inserted = change.inserted,
        deleted = change.deleted,
        reservations_removed = change.reservations_removed,
        skipped = change.skipped.len(),
        "seat grid staged"
    );
    Ok(change)
}
