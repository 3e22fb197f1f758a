//! Concurrent workspace update engine.
//!
//! Once per tick the engine propagates every coupling on a dedicated
//! driver thread, then fans each component's update parts out to a
//! bounded worker pool behind a two-level completion barrier: an inner
//! signal per component chained to an outer signal per tick. Component
//! updates never start before the tick's coupling propagation is
//! complete, and the next tick's propagation never starts before every
//! update of the current tick has finished.
//!
//! Lifecycle notifications are delivered on a separate single-thread
//! event context so listener code can never block or deadlock pool
//! workers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
pub mod coordinator;
mod driver;
pub mod notify;
pub mod pool;
pub mod signal;

pub use config::EngineConfig;
pub use controller::{ParallelController, SerialController, TickContext, TickOutcome, UpdateController};
pub use coordinator::UpdateCoordinator;
pub use notify::EventNotifier;
pub use pool::WorkerPool;
pub use signal::CompletionSignal;
