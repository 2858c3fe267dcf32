//! Mock implementations of common traits

#![allow(clippy::missing_panics_doc)]

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::observability::Logger;
use crate::resilience::{Admission, OperationClass, RequestLimiter, Unlimited};

/// Logger that keeps every line in memory.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded lines in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Whether any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    /// Number of recorded lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }
}

impl Logger for RecordingLogger {
    fn printf(&self, args: fmt::Arguments<'_>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(args.to_string());
        }
    }
}

/// Limiter wrapper that counts how often each entry point is called.
///
/// Transport tests use it to check that one attempt records exactly one
/// admission and that backoff only peeks.
#[derive(Clone)]
pub struct CountingLimiter {
    inner: Arc<dyn RequestLimiter>,
    waits: Arc<AtomicUsize>,
    admitted: Arc<AtomicUsize>,
    peeks: Arc<AtomicUsize>,
}

impl CountingLimiter {
    /// Count calls on a limiter that admits everything.
    pub fn unlimited() -> Self {
        Self::wrap(Arc::new(Unlimited))
    }

    pub fn wrap(inner: Arc<dyn RequestLimiter>) -> Self {
        Self {
            inner,
            waits: Arc::new(AtomicUsize::new(0)),
            admitted: Arc::new(AtomicUsize::new(0)),
            peeks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Number of `wait` calls that admitted the request.
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }

    pub fn peeks(&self) -> usize {
        self.peeks.load(Ordering::SeqCst)
    }
}

impl RequestLimiter for CountingLimiter {
    fn wait(&self, class: OperationClass) -> Admission {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let admission = self.inner.wait(class);
        if !admission.must_wait() {
            self.admitted.fetch_add(1, Ordering::SeqCst);
        }
        admission
    }

    fn peek(&self, class: OperationClass) -> Admission {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        self.inner.peek(class)
    }
}
