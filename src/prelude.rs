//! Commonly used items for convenient importing.
//!
//! ```rust
//! use polyerr::prelude::*;
//!
//! fn divide(a: i32, b: i32) -> polyerr::Result<i32> {
//!     if b == 0 {
//!         bail!("cannot divide ", a, " by zero");
//!     }
//!     Ok(a / b)
//! }
//!
//! assert_eq!(divide(10, 2).unwrap(), 5);
//! let error: ErrorValue = divide(1, 0).unwrap_err();
//! assert_eq!(error.to_string(), "cannot divide 1 by zero");
//! ```

pub use crate::{ErrorValue, Payload, StackTrace, bail, error};
