use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative interrupt flag shared with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Records an interrupt signal and reports whether one was already pending.
    pub fn signal(&self) -> Interrupt {
        if self.0.swap(true, Ordering::SeqCst) {
            Interrupt::Repeated
        } else {
            Interrupt::First
        }
    }
}

/// A first interrupt asks the run to stop at the next checkpoint; a repeated
/// one means the caller should not wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    First,
    Repeated,
}

/// Result of a stage that may stop early on interrupt.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Completed(T),
    Interrupted,
}

impl<T> Step<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Step::Completed(value) => Some(value),
            Step::Interrupted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A new phase of the run begins.
    Phase(String),
    /// A counted loop of `total` items begins.
    Begin { label: String, total: u64 },
    /// One item of the current loop finished.
    Tick { message: String },
    /// The current loop ended.
    End,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}
