//! Version-based conflict detection. Nothing is ever merged automatically.

use crate::record::{Record, RecordStatus};

/// What a pull does with one remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullAction {
    /// Store the remote record as the synced local state.
    Adopt,
    /// Leave the local record alone; it has unpushed changes.
    Skip,
    /// Local is ahead of the server; flag it for the user.
    MarkConflict,
}

/// User's choice for a record in conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite the server with the local payload.
    KeepLocal,
    /// Discard local changes in favour of the server copy.
    TakeRemote,
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Decide how a pulled remote record at `remote_version` applies.
    ///
    /// Rules:
    /// 1. No local copy: adopt.
    /// 2. Local has pending, conflicting or deleted state: skip.
    /// 3. Local synced and ahead of remote: mark conflict.
    /// 4. Otherwise (remote equal or newer): adopt.
    pub fn on_pull(local: Option<&Record>, remote_version: u64) -> PullAction {
        match local {
            None => PullAction::Adopt,
            Some(local) if local.status != RecordStatus::Synced => PullAction::Skip,
            Some(local) if local.version > remote_version => PullAction::MarkConflict,
            Some(_) => PullAction::Adopt,
        }
    }

    /// Whether a local record absent from the server set was deleted remotely.
    pub fn deleted_remotely(local: &Record) -> bool {
        matches!(local.status, RecordStatus::Synced | RecordStatus::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;
    use uuid::Uuid;

    fn make_record(version: u64, status: RecordStatus) -> Record {
        Record {
            id: Uuid::new_v4(),
            kind: RecordKind::Text,
            payload: vec![],
            nonce: vec![],
            version,
            status,
        }
    }

    #[test]
    fn unknown_record_is_adopted() {
        assert_eq!(ConflictResolver::on_pull(None, 1), PullAction::Adopt);
    }

    #[test]
    fn unsynced_local_is_skipped() {
        for status in [
            RecordStatus::Pending,
            RecordStatus::Conflict,
            RecordStatus::Deleted,
        ] {
            let local = make_record(1, status);
            assert_eq!(
                ConflictResolver::on_pull(Some(&local), 5),
                PullAction::Skip,
                "{:?}",
                status
            );
        }
    }

    #[test]
    fn newer_or_equal_remote_wins() {
        let local = make_record(2, RecordStatus::Synced);
        assert_eq!(ConflictResolver::on_pull(Some(&local), 3), PullAction::Adopt);
        assert_eq!(ConflictResolver::on_pull(Some(&local), 2), PullAction::Adopt);
    }

    #[test]
    fn local_ahead_of_remote_is_conflict() {
        let local = make_record(2, RecordStatus::Synced);
        assert_eq!(
            ConflictResolver::on_pull(Some(&local), 1),
            PullAction::MarkConflict
        );
    }

    #[test]
    fn only_acknowledged_records_count_as_remotely_deleted() {
        assert!(ConflictResolver::deleted_remotely(&make_record(
            1,
            RecordStatus::Synced
        )));
        assert!(ConflictResolver::deleted_remotely(&make_record(
            1,
            RecordStatus::Conflict
        )));
        assert!(!ConflictResolver::deleted_remotely(&make_record(
            1,
            RecordStatus::Pending
        )));
        assert!(!ConflictResolver::deleted_remotely(&make_record(
            1,
            RecordStatus::Deleted
        )));
    }
}
