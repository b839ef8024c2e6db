//! Filesystem watching: the startup walk and change dispatch.
//!
//! The watch set is built once by [`WatchSetBuilder`] before the first
//! generation starts. Afterwards [`FileEventDispatcher`] turns raw
//! notifications into restart requests.

mod builder;
mod dispatcher;

pub use builder::{Subscriber, WatchSetBuilder, WatchSetSummary};
pub use dispatcher::{FileEventDispatcher, watcher};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

/// Notification kinds the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A file was created (or renamed into place)
    Created,
    /// File contents were written
    Written,
}

impl ChangeKind {
    /// Classify a raw notification. Removals, metadata changes and access
    /// events are not changes.
    pub fn classify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
                Some(ChangeKind::Written)
            }
            // Editors that save via rename land the new file with a rename-to.
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
                Some(ChangeKind::Created)
            }
            _ => None,
        }
    }
}
