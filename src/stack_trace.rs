//! Shared, immutable stack traces.
//!
//! A [`StackTrace`] is captured once when an [`ErrorValue`] is created from a
//! payload, and is then shared by every copy of that error. Copying a trace
//! only bumps an atomic reference count; the text is never duplicated.
//!
//! [`ErrorValue`]: crate::ErrorValue

use alloc::{string::String, vec::Vec};
use core::fmt;

use crate::hooks::{self, TraceCollector};

/// Message shown in place of a stack trace that was not collected.
pub const NOT_COLLECTED_MESSAGE: &str = "stack trace was not collected. Enable stack trace \
     collection by building with the `backtrace` feature and setting the environment variable \
     `POLYERR_BACKTRACE=1`";

/// A reference-counted, human-readable stack trace, or the marker for a trace
/// that was not collected.
///
/// # Depth
///
/// The capture functions take a signed depth:
///
/// - a negative depth never calls the collector and gives a trace that was not
///   collected
/// - `0` asks the collector for the full trace
/// - a positive depth asks for at most that many frames
///
/// # Examples
///
/// ```
/// use polyerr::StackTrace;
///
/// let trace = StackTrace::capture_with(&|_max_frames: usize| b"main - src/main.rs:3".to_vec(), 0);
/// assert_eq!(trace.as_str(), Some("main - src/main.rs:3"));
///
/// let shared = trace.clone();
/// assert!(shared.ptr_eq(&trace));
///
/// let skipped = StackTrace::capture(-1);
/// assert!(!skipped.is_collected());
/// assert_eq!(skipped.to_string(), polyerr::stack_trace::NOT_COLLECTED_MESSAGE);
/// ```
#[derive(Clone, Default)]
pub struct StackTrace {
    /// The trace text, or `None` if no trace was collected.
    buffer: Option<triomphe::Arc<String>>,
}

impl StackTrace {
    /// Returns a trace that was not collected. This does not allocate.
    #[inline]
    pub const fn not_collected() -> Self {
        Self { buffer: None }
    }

    /// Captures a stack trace using the installed [`TraceCollector`].
    ///
    /// If no collector has been installed through [`Hooks`], the built-in
    /// collector is used. See [`hooks`] for details.
    ///
    /// [`Hooks`]: crate::hooks::Hooks
    pub fn capture(depth: isize) -> Self {
        if depth < 0 {
            return Self::not_collected();
        }
        Self::from_collected(hooks::collect_trace(depth.unsigned_abs()))
    }

    /// Captures a stack trace using the given collector instead of the
    /// installed one.
    pub fn capture_with<C>(collector: &C, depth: isize) -> Self
    where
        C: TraceCollector + ?Sized,
    {
        if depth < 0 {
            return Self::not_collected();
        }
        Self::from_collected(collector.capture(depth.unsigned_abs()))
    }

    /// Copies the bytes produced by a collector into a shared buffer. The
    /// collector's own buffer is released afterwards.
    fn from_collected(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::trace!("stack trace collector returned no frames");
            return Self::not_collected();
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(bytes = bytes.len(), "collected stack trace");

        let text = String::from_utf8_lossy(&bytes).into_owned();
        drop(bytes);
        Self {
            buffer: Some(triomphe::Arc::new(text)),
        }
    }

    /// Returns `true` if a trace was collected.
    #[inline]
    pub fn is_collected(&self) -> bool {
        self.buffer.is_some()
    }

    /// Returns the trace text, or `None` if no trace was collected.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.buffer.as_deref().map(String::as_str)
    }

    /// Returns `true` if both traces share the same buffer. Two traces that
    /// were not collected are considered to share the empty marker.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => triomphe::Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or(NOT_COLLECTED_MESSAGE))
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackTrace")
            .field("trace", &self.as_str())
            .finish()
    }
}
