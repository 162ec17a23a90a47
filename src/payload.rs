//! The capability set required from error payloads.

use core::fmt;

/// Types that can be held by an [`ErrorValue`].
///
/// A payload must be cloneable (copies of an error value deep-copy their
/// payload), displayable (the error's message is the payload's
/// [`Display`](fmt::Display) output), thread-safe and `'static`. The trait is
/// implemented automatically for every type that satisfies these bounds.
///
/// # Examples
///
/// ```
/// use std::fmt;
///
/// use polyerr::{ErrorValue, Payload};
///
/// #[derive(Clone, Debug)]
/// struct NotFound {
///     key: u32,
/// }
///
/// impl fmt::Display for NotFound {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "key {} not found", self.key)
///     }
/// }
///
/// fn assert_payload<T: Payload>() {}
/// assert_payload::<NotFound>();
///
/// let error = ErrorValue::new(NotFound { key: 7 });
/// assert_eq!(error.to_string(), "key 7 not found");
/// ```
///
/// [`ErrorValue`]: crate::ErrorValue
pub trait Payload: Clone + fmt::Display + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + fmt::Display + Send + Sync + 'static {}
