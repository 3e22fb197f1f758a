//! Core types and traits for the Conflux workspace update engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the contracts between the update engine and its collaborators:
//! components and their update parts, the workspace that owns them,
//! the coupling manager, lifecycle listeners, and the task
//! synchronization hook.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod component;
pub mod error;
pub mod hook;
pub mod id;
pub mod listener;

pub use component::{Component, CouplingManager, UpdatePart, Workspace};
pub use error::{ConfigError, CouplingError, PartError};
pub use hook::{NoopHook, TaskSyncHook};
pub use id::{ListenerId, SlotId, TickId};
pub use listener::UpdateListener;
