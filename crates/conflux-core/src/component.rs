//! Collaborator traits: components, update parts, the workspace, and
//! the coupling manager.
//!
//! The engine treats all four as opaque. It never retains a component
//! beyond the tick in which it was snapshotted, and update parts are
//! created fresh each tick and discarded after execution.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{CouplingError, PartError};

/// The smallest schedulable unit of a component's update work.
///
/// Parts of one component may run in any interleaving across pool
/// workers, including fully sequentially on a single worker, and must
/// not depend on execution order relative to parts of other
/// components.
///
/// # Contract
///
/// - `run()` is called exactly once; the part is discarded afterwards.
/// - A returned `Err` (or a panic) is caught at the pool-task boundary
///   and reported; it never aborts the tick.
pub trait UpdatePart: Send {
    /// Execute this part's share of the component update.
    fn run(&self) -> Result<(), PartError>;
}

/// An independently updatable simulation module.
///
/// Owned by the [`Workspace`]; the engine holds only a transient
/// snapshot reference per tick.
///
/// # Examples
///
/// ```
/// use conflux_core::{Component, PartError, UpdatePart};
/// use smallvec::{smallvec, SmallVec};
///
/// struct Step;
/// impl UpdatePart for Step {
///     fn run(&self) -> Result<(), PartError> { Ok(()) }
/// }
///
/// struct Oscillator;
/// impl Component for Oscillator {
///     fn name(&self) -> &str { "oscillator" }
///     fn update_parts(&self) -> SmallVec<[Box<dyn UpdatePart>; 4]> {
///         smallvec![Box::new(Step) as Box<dyn UpdatePart>]
///     }
/// }
///
/// assert!(Oscillator.is_update_enabled());
/// ```
pub trait Component: Send + Sync {
    /// Human-readable name for notifications and failure reporting.
    fn name(&self) -> &str;

    /// Whether this component participates in the current tick.
    ///
    /// A disabled component executes no update parts but still counts
    /// toward tick completion. Default: enabled.
    fn is_update_enabled(&self) -> bool {
        true
    }

    /// Decompose this tick's update into independently schedulable
    /// parts.
    ///
    /// Called once per tick on the driver thread. An empty collection
    /// is valid: the component contributes nothing this tick.
    fn update_parts(&self) -> SmallVec<[Box<dyn UpdatePart>; 4]>;
}

/// The external owner of the component list.
pub trait Workspace: Send + Sync {
    /// Return a snapshot copy of the current component list.
    ///
    /// Must return a fresh `Vec` on every call (copy-on-read) so that
    /// concurrent structural edits to the workspace cannot interfere
    /// with an in-flight tick.
    fn components(&self) -> Vec<Arc<dyn Component>>;
}

/// Propagates data along every coupling edge in the workspace.
pub trait CouplingManager: Send + Sync {
    /// Propagate all couplings.
    ///
    /// Synchronous: all edges are fully propagated when this returns.
    /// Called on the driver thread before any component update of the
    /// same tick starts.
    fn update_all_couplings(&self) -> Result<(), CouplingError>;
}
