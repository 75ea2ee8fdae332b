//! Sibling ordering rules for lessons within a course and cards within a lesson.
//!
//! New items are appended; deleting an item shifts every later sibling down by
//! one so orders stay contiguous from zero.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderError {
    #[error("order {0} is already taken")]
    Collision(u32),

    #[error("no sibling has order {0}")]
    Missing(u32),
}

/// A single order change produced by a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reindex {
    pub from: u32,
    pub to: u32,
}

/// Order for a newly appended sibling: the sibling count.
///
/// Seed data may contain gaps; when the count is already taken, the order after
/// the current maximum is used instead so the append never collides.
#[must_use]
pub fn next_order(existing: &[u32]) -> u32 {
    let count = u32::try_from(existing.len()).unwrap_or(u32::MAX);
    if existing.contains(&count) {
        existing.iter().max().map_or(count, |max| max.saturating_add(1))
    } else {
        count
    }
}

/// Check that `order` is free among `existing`.
///
/// # Errors
///
/// Returns `OrderError::Collision` if a sibling already has `order`.
pub fn check_append(existing: &[u32], order: u32) -> Result<(), OrderError> {
    if existing.contains(&order) {
        return Err(OrderError::Collision(order));
    }
    Ok(())
}

/// Order changes needed after removing the sibling at `removed`.
///
/// Returned in ascending order of `from`, so applying them one by one never
/// collides with a sibling that has not moved yet.
///
/// # Errors
///
/// Returns `OrderError::Missing` if no sibling has `removed`.
pub fn reindex_after_delete(existing: &[u32], removed: u32) -> Result<Vec<Reindex>, OrderError> {
    if !existing.contains(&removed) {
        return Err(OrderError::Missing(removed));
    }
    let mut later: Vec<u32> = existing.iter().copied().filter(|o| *o > removed).collect();
    later.sort_unstable();
    Ok(later
        .into_iter()
        .map(|from| Reindex { from, to: from - 1 })
        .collect())
}
