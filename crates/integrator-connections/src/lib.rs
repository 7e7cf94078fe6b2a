//! Connection wizard, registry and sync coordination
//!
//! A [`ConnectionDraft`] walks the user through four steps and produces a
//! [`Submission`]; the [`ConnectionRegistry`] stores the result. Syncs run
//! through a [`SyncCoordinator`] on top of any [`SyncJobs`] backend.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod draft;
pub mod registry;
pub mod sync;

pub use draft::{Advance, ConnectionDraft, Submission, WizardStep};
pub use registry::{ConnectionRegistry, ConnectionSummary, EMPTY_REGISTRY_MESSAGE};
pub use sync::{JobHandle, JobState, SimulatedSyncJobs, SyncCoordinator, SyncJobs, SyncOutcome};
