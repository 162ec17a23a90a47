//! The stack trace collector interface.
//!
//! A [`TraceCollector`] is the platform primitive that produces the text of a
//! stack trace. [`StackTrace`] calls it when an error value is created from a
//! payload, copies the returned bytes into a shared buffer and drops the
//! collector's buffer.
//!
//! [`StackTrace`]: crate::StackTrace

use alloc::vec::Vec;

/// Produces the text of the current stack trace.
///
/// # Contract
///
/// - `max_frames == 0` asks for every frame, otherwise at most `max_frames`
///   frames should be rendered.
/// - An empty vector means the trace was not collected, for instance because
///   collection is disabled or unsupported on the platform.
/// - The returned bytes should be UTF-8; invalid sequences are replaced when
///   the trace is displayed.
///
/// Closures of type `Fn(usize) -> Vec<u8>` implement this trait.
///
/// # Examples
///
/// ```
/// use polyerr::hooks::TraceCollector;
///
/// struct FixedTrace;
///
/// impl TraceCollector for FixedTrace {
///     fn capture(&self, _max_frames: usize) -> Vec<u8> {
///         b"main - src/main.rs:1".to_vec()
///     }
/// }
///
/// assert_eq!(FixedTrace.capture(0), b"main - src/main.rs:1");
/// ```
pub trait TraceCollector: Send + Sync + 'static {
    /// Renders the current stack trace.
    fn capture(&self, max_frames: usize) -> Vec<u8>;
}

impl<F> TraceCollector for F
where
    F: Fn(usize) -> Vec<u8> + Send + Sync + 'static,
{
    #[inline]
    fn capture(&self, max_frames: usize) -> Vec<u8> {
        self(max_frames)
    }
}

/// A collector that never collects anything.
///
/// Installing it turns off stack traces even when the built-in collector
/// would be enabled by the environment.
#[derive(Copy, Clone, Debug, Default)]
pub struct DisabledCollector;

impl TraceCollector for DisabledCollector {
    #[inline]
    fn capture(&self, _max_frames: usize) -> Vec<u8> {
        Vec::new()
    }
}
