#![no_std]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A polymorphic error value for Rust.
//!
//! ## Overview
//!
//! [`ErrorValue`] is a single concrete type that can hold an error payload of
//! any type implementing [`Payload`] (`Clone + Display + Send + Sync +
//! 'static`). Code that produces errors can raise its own domain types, while
//! callers handle one uniform, fixed-size value.
//!
//! ```
//! use polyerr::prelude::*;
//!
//! #[derive(Clone, Debug)]
//! struct Timeout {
//!     millis: u32,
//! }
//!
//! impl std::fmt::Display for Timeout {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "timed out after {}ms", self.millis)
//!     }
//! }
//!
//! fn fetch(millis: u32) -> polyerr::Result<&'static str> {
//!     if millis > 100 {
//!         return Err(ErrorValue::new(Timeout { millis }));
//!     }
//!     Ok("payload")
//! }
//!
//! let error = fetch(250).unwrap_err();
//! assert_eq!(error.to_string(), "timed out after 250ms");
//! assert_eq!(error.get::<Timeout>().millis, 250);
//! ```
//!
//! ## Cost Model
//!
//! - The empty value, which means "no error", never allocates and never
//!   captures a stack trace.
//! - Payloads of at most two pointers in size and pointer alignment are stored
//!   inline. Larger payloads are boxed. See [`StorageMode`].
//! - Cloning an error value deep-copies the payload and shares the stack trace
//!   through an atomic reference count.
//!
//! ## Stack Traces
//!
//! An error value created from a payload captures a [`StackTrace`] through
//! the installed [`TraceCollector`]. By default nothing is collected; enable
//! the `backtrace` feature and set `POLYERR_BACKTRACE=1`, or install your own
//! collector with [`Hooks`].
//!
//! ## Features
//!
//! - `std`: enables items that need the standard library.
//! - `backtrace`: the built-in stack trace collector, based on the
//!   [`backtrace`](https://docs.rs/backtrace) crate. Implies `std`.
//! - `tracing`: emits [`tracing`](https://docs.rs/tracing) events on trace
//!   capture and on payload type mismatches.
//!
//! For implementation details, see the [`polyerr-internals`] crate.
//!
//! [`TraceCollector`]: hooks::TraceCollector
//! [`Hooks`]: hooks::Hooks
//! [`polyerr-internals`]: polyerr_internals

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

pub mod hooks;
pub mod prelude;
pub mod stack_trace;

mod error_value;
mod payload;

pub use polyerr_internals::StorageMode;

pub use self::{error_value::ErrorValue, payload::Payload, stack_trace::StackTrace};

/// A [`Result`](core::result::Result) type alias where the error defaults to
/// [`ErrorValue`].
///
/// # Examples
///
/// ```
/// fn might_fail() -> polyerr::Result<String> {
///     Ok("success".to_string())
/// }
/// ```
pub type Result<T, E = ErrorValue> = core::result::Result<T, E>;

// Not public API. Referenced by macro-generated code.
#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    pub use core::{fmt::Display, result::Result::Err};
}
