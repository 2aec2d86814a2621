//! Commit steps shared by every store
//!
//! A commit runs in three phases under the store's write exclusion:
//! revision checks, the write interceptor, then sealing (id and revision
//! assignment). Only sealed records are written.

use diary_core::{Change, ChangeKind, Event, EventId, Revision, StorageError};

/// Fail unless the stored revision still matches what the writer read
pub(crate) fn check_revision(
    id: EventId,
    expected: Revision,
    actual: Option<Revision>,
) -> Result<(), StorageError> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(StorageError::Conflict {
            id,
            expected,
            actual,
        }),
    }
}

/// Assign ids to inserts and bump revisions of updates
pub(crate) fn seal(
    changes: Vec<Change<Event>>,
    mut next_id: impl FnMut() -> EventId,
) -> Vec<Event> {
    changes
        .into_iter()
        .map(|change| {
            let mut event = change.record;
            match change.kind {
                ChangeKind::Added => {
                    event.id = next_id();
                    event.revision = Revision::INITIAL;
                }
                ChangeKind::Modified { expected } => {
                    event.revision = expected.next();
                }
            }
            event
        })
        .collect()
}
