// model = "claude-opus-4-5"
// created = "2026-02-03"
// modified = "2026-02-04"
// driver = "Isaac Clayton"

//! Collaborators: the producers and consumers attached to a buffer.
//!
//! A collaborator comes in one of two flavors:
//!
//! - **Async**: `push` and `pull` run in separate workers, so a
//!   collaborator can absorb notifications while it is still producing
//!   its previous batch (file I/O, external tooling).
//! - **Sync**: a single `edit` call that maps a notification to a
//!   response in one worker (highlighting, pure analyses).
//!
//! Both flavors share a small capability set: a stable name and the two
//! debounce delays the buffer honors before delivering a notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::edit::EditNotification;
use crate::edit::EditResponse;

/// A failure surfaced from collaborator user code. The buffer logs it
/// and retires the worker; the buffer itself keeps running.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Capabilities shared by both collaborator flavors.
pub trait Collaborator: Send + Sync {
    /// A stable identifier, used in logs.
    fn name(&self) -> &str;

    /// Minimum user idle time before this collaborator wants to hear
    /// about a change.
    fn push_delay_from_idle(&self) -> Duration {
        return Duration::ZERO;
    }

    /// Maximum latency from the first observed change, idle or not.
    fn push_delay_from_start(&self) -> Duration {
        return Duration::ZERO;
    }
}

/// A collaborator with decoupled intake and output.
#[async_trait]
pub trait AsyncCollaborator: Collaborator {
    /// Consume a snapshot. May block on external I/O.
    async fn push(&self, notification: EditNotification) -> Result<(), CollaboratorError>;

    /// Produce the next batch. Blocks until work is available, or
    /// until the collaborator is finished (then `done` is set).
    async fn pull(&self) -> Result<EditResponse, CollaboratorError>;
}

/// A collaborator that answers each notification with one response.
#[async_trait]
pub trait SyncCollaborator: Collaborator {
    /// Map a snapshot to the commands it provokes.
    async fn edit(&self, notification: EditNotification) -> Result<EditResponse, CollaboratorError>;
}

/// The two flavors, unified for the buffer's registry. Worker spawning
/// dispatches on the variant.
#[derive(Clone)]
pub enum CollaboratorHandle {
    /// Split push/pull collaborator: two workers.
    Async(Arc<dyn AsyncCollaborator>),
    /// Request/response collaborator: one worker.
    Sync(Arc<dyn SyncCollaborator>),
}

impl CollaboratorHandle {
    /// The collaborator's stable name.
    pub fn name(&self) -> &str {
        return match self {
            CollaboratorHandle::Async(c) => c.name(),
            CollaboratorHandle::Sync(c) => c.name(),
        };
    }

    /// Minimum idle time before delivery.
    pub fn push_delay_from_idle(&self) -> Duration {
        return match self {
            CollaboratorHandle::Async(c) => c.push_delay_from_idle(),
            CollaboratorHandle::Sync(c) => c.push_delay_from_idle(),
        };
    }

    /// Maximum latency from first observed change.
    pub fn push_delay_from_start(&self) -> Duration {
        return match self {
            CollaboratorHandle::Async(c) => c.push_delay_from_start(),
            CollaboratorHandle::Sync(c) => c.push_delay_from_start(),
        };
    }
}
