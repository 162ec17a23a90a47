//! Built-in trace collection used when no collector has been installed.
//!
//! - With the `backtrace` feature, [`backtrace::BacktraceCollector`] is
//!   configured from the environment and used for every capture. It stays
//!   silent unless `POLYERR_BACKTRACE` opts in.
//! - Without it, nothing is collected and every trace displays
//!   [`NOT_COLLECTED_MESSAGE`].
//!
//! [`NOT_COLLECTED_MESSAGE`]: crate::stack_trace::NOT_COLLECTED_MESSAGE

#[cfg(feature = "backtrace")]
pub mod backtrace;

use alloc::vec::Vec;

/// Collects a trace with the built-in collector.
#[cfg(feature = "backtrace")]
pub(crate) fn default_capture(max_frames: usize) -> Vec<u8> {
    use crate::hooks::TraceCollector;

    backtrace::BacktraceCollector::new_from_env().capture(max_frames)
}

/// Collects a trace with the built-in collector.
#[cfg(not(feature = "backtrace"))]
pub(crate) fn default_capture(_max_frames: usize) -> Vec<u8> {
    Vec::new()
}
