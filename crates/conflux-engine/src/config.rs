//! Engine configuration.

use crate::controller::UpdateController;

/// Upper bound on worker pool size, shared by every configuration path.
pub(crate) const MAX_THREADS: usize = 64;

/// Configuration for [`UpdateCoordinator`](crate::UpdateCoordinator).
///
/// `threads: None` auto-detects the host parallelism. The controller
/// defaults to [`ParallelController`](crate::ParallelController).
#[derive(Default)]
pub struct EngineConfig {
    /// Number of pool workers for component updates. `None` =
    /// auto-detect from `std::thread::available_parallelism()`.
    pub threads: Option<usize>,
    /// Update policy. `None` = the default parallel controller.
    pub controller: Option<Box<dyn UpdateController>>,
}

impl EngineConfig {
    /// Resolve the actual worker count, applying auto-detection if
    /// `None`. Explicit values are clamped to `[1, MAX_THREADS]`.
    pub fn resolved_threads(&self) -> usize {
        match self.threads {
            Some(n) => n.clamp(1, MAX_THREADS),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(1, MAX_THREADS),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("threads", &self.threads)
            .field(
                "controller",
                &self.controller.as_ref().map(|c| c.name().to_string()),
            )
            .finish()
    }
}
