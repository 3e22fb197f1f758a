//! Countdown completion signal with hierarchical chaining.
//!
//! A [`CompletionSignal`] is armed for an exact number of completions.
//! Each sub-task calls [`done()`](CompletionSignal::done) exactly once;
//! when the count reaches zero the waiter unblocks and the chained
//! parent signal, if any, receives its own `done()` call. Chaining one
//! signal per component into one signal per tick forms the two-level
//! barrier the default controller runs on, without the tick signal
//! needing to know any component's part count in advance.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

struct Inner {
    remaining: Mutex<usize>,
    zero: Condvar,
    parent: Option<CompletionSignal>,
}

/// Cloneable countdown barrier.
///
/// Clones share the same count; the signal is satisfied once `done()`
/// has been called as many times as the count it was armed with.
///
/// # Examples
///
/// ```
/// use conflux_engine::CompletionSignal;
///
/// let signal = CompletionSignal::new(2);
/// assert!(!signal.is_complete());
/// signal.done();
/// assert!(signal.done()); // second call completes the signal
/// signal.wait(); // returns immediately
/// ```
#[derive(Clone)]
pub struct CompletionSignal {
    inner: Arc<Inner>,
}

impl CompletionSignal {
    /// Create a signal armed for exactly `n` completions.
    ///
    /// `n = 0` is the degenerate case: the signal is already satisfied
    /// and [`wait()`](Self::wait) returns immediately.
    pub fn new(n: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                remaining: Mutex::new(n),
                zero: Condvar::new(),
                parent: None,
            }),
        }
    }

    /// Create a signal armed for `n` completions whose own completion
    /// counts as one `done()` on `parent`.
    ///
    /// With `n = 0` the signal is born satisfied and `parent.done()`
    /// fires before this returns.
    pub fn chained(n: usize, parent: &CompletionSignal) -> Self {
        let signal = Self {
            inner: Arc::new(Inner {
                remaining: Mutex::new(n),
                zero: Condvar::new(),
                parent: Some(parent.clone()),
            }),
        };
        if n == 0 {
            parent.done();
        }
        signal
    }

    /// Report one completion.
    ///
    /// Returns `true` iff this call brought the count to zero — exactly
    /// one caller observes `true`, which lets the completing worker
    /// fire a finished notification without racing its peers.
    ///
    /// # Panics
    ///
    /// Panics when called on an already-satisfied signal. More `done()`
    /// calls than the armed count is a bookkeeping bug in the caller,
    /// not a recoverable runtime condition.
    pub fn done(&self) -> bool {
        let completed = {
            let mut remaining = self
                .inner
                .remaining
                .lock()
                .expect("completion signal lock poisoned");
            assert!(
                *remaining > 0,
                "done() called on an already-satisfied CompletionSignal"
            );
            *remaining -= 1;
            *remaining == 0
        };
        if completed {
            self.inner.zero.notify_all();
            if let Some(parent) = &self.inner.parent {
                parent.done();
            }
        }
        completed
    }

    /// Block the calling thread until the count reaches zero.
    ///
    /// Returns immediately when the signal is already satisfied.
    /// Intended for the driver thread only — pool workers never wait
    /// on signals.
    pub fn wait(&self) {
        let mut remaining = self
            .inner
            .remaining
            .lock()
            .expect("completion signal lock poisoned");
        while *remaining > 0 {
            remaining = self
                .inner
                .zero
                .wait(remaining)
                .expect("completion signal lock poisoned");
        }
    }

    /// Whether the count has reached zero.
    pub fn is_complete(&self) -> bool {
        *self
            .inner
            .remaining
            .lock()
            .expect("completion signal lock poisoned")
            == 0
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let remaining = self
            .inner
            .remaining
            .lock()
            .map(|r| *r)
            .unwrap_or(usize::MAX);
        f.debug_struct("CompletionSignal")
            .field("remaining", &remaining)
            .field("chained", &self.inner.parent.is_some())
            .finish()
    }
}
