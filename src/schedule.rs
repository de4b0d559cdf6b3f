use jiff::{SignedDuration, Timestamp};

use crate::{
    entities::projection,
    error::{BookingError, BookingResult},
};

/// Admits `candidate` unless an existing start time lies strictly inside
/// `(candidate - window, candidate + window)`. Starts exactly one window
/// apart do not conflict.
pub fn check_conflict(
    candidate: Timestamp,
    existing: impl IntoIterator<Item = Timestamp>,
    window: SignedDuration,
) -> BookingResult<()> {
    match existing.into_iter().find(|start| overlaps(candidate, *start, window)) {
        Some(start) => {
            tracing::debug!(%candidate, blocking = %start, "projection rejected by schedule");
            Err(BookingError::ScheduleConflict)
        },
        None => Ok(()),
    }
}

fn overlaps(candidate: Timestamp, existing: Timestamp, window: SignedDuration) -> bool {
    existing.duration_since(candidate).abs() < window
}

pub fn starts_at(projection: &projection::Model) -> BookingResult<Timestamp> {
    Timestamp::from_second(projection.starts_at).map_err(|err| {
        BookingError::Invalid(format!("projection {} has invalid start: {err}", projection.id))
    })
}
