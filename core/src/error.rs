use thiserror::Error;

use crate::group::GroupId;
use crate::manager::ManagerId;
use crate::playback::ContainerId;
use crate::scope::Scope;

/// Error type for selection core operations.
///
/// Consistency violations (duplicate registration, removing a slot that never
/// existed, a broken priority comparator) signal a caller bug and are never
/// recovered internally. Stale references are not errors at all: operations on
/// already-removed playbacks or buckets are absorbed as logged no-ops, because
/// external event delivery can race with removal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The container slot already has a registered playback.
    #[error("container {0} already has a registered playback")]
    DuplicateSlot(ContainerId),

    /// The container slot was never registered with this manager.
    #[error("container {0} was never registered")]
    UnknownSlot(ContainerId),

    /// No manager with the given id exists.
    #[error("manager {0} not found")]
    UnknownManager(ManagerId),

    /// No group with the given id exists.
    #[error("group {0} not found")]
    UnknownGroup(GroupId),

    /// The volume target does not match the declared scope, or does not
    /// resolve to a live object. Nothing is propagated on rejection.
    #[error("volume target does not match scope {scope:?}")]
    InvalidTarget { scope: Scope },

    /// The priority comparator of two hosts is not antisymmetric.
    #[error("priority comparison is not antisymmetric: {ltr} + {rtl} != 0")]
    PriorityContract { ltr: i32, rtl: i32 },
}

impl SelectionError {
    /// Whether this error is a fatal consistency violation rather than an
    /// addressing problem. Consistency violations must surface immediately.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            SelectionError::DuplicateSlot(_)
                | SelectionError::UnknownSlot(_)
                | SelectionError::PriorityContract { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SelectionError>;
