use alloc::string::String;
use core::{any::type_name, fmt};

use polyerr_internals::RawPayload;

use crate::{Payload, StackTrace};

/// A polymorphic error value.
///
/// An `ErrorValue` is either empty, meaning "no error", or holds a payload of
/// any type implementing [`Payload`] together with the [`StackTrace`] captured
/// when it was created. The payload's concrete type is erased: the value is
/// always three pointers of payload storage plus one pointer for the trace,
/// and small payloads are stored inline without allocating.
///
/// # Construction
///
/// - [`ErrorValue::empty`] and [`Default`] never capture a trace.
/// - [`ErrorValue::new`] captures a full trace.
/// - [`ErrorValue::with_trace_depth`] takes an explicit depth, see
///   [`StackTrace`].
/// - [`ErrorValue::from_fragments`] and the [`error!`](crate::error!) macro
///   build a `String` payload from displayable fragments.
///
/// # Inspection
///
/// [`get`](ErrorValue::get) panics when the payload has another type, since
/// asking for the wrong type is a bug in the caller. Use
/// [`downcast_ref`](ErrorValue::downcast_ref) or
/// [`is_a`](ErrorValue::is_a) when the type is not known.
///
/// # Examples
///
/// ```
/// use polyerr::ErrorValue;
///
/// fn parse_port(input: &str) -> Result<u16, ErrorValue> {
///     input.parse::<u16>().map_err(|_| polyerr::error!("invalid port `", input, "`"))
/// }
///
/// let error = parse_port("http").unwrap_err();
/// assert!(error.is_set());
/// assert!(error.is_a::<String>());
/// assert_eq!(error.to_string(), "invalid port `http`");
/// assert_eq!(format!("{error:?}"), "Error(invalid port `http`)");
///
/// let ok = ErrorValue::default();
/// assert!(!ok.is_set());
/// assert_eq!(ok.to_string(), "");
/// ```
#[derive(Clone, Default)]
pub struct ErrorValue {
    /// # Safety
    ///
    /// The payload is either empty or was created from a type implementing
    /// [`Payload`], which makes it `Send + Sync`.
    payload: RawPayload,
    trace: StackTrace,
}

// SAFETY: Every payload stored in an `ErrorValue` implements `Payload`, so it
// is `Send + Sync`. The stack trace is `Send + Sync` on its own.
unsafe impl Send for ErrorValue {}
// SAFETY: See the `Send` impl above.
unsafe impl Sync for ErrorValue {}

impl ErrorValue {
    /// Creates an empty error value. This never allocates or captures a
    /// stack trace.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// const NO_ERROR: ErrorValue = ErrorValue::empty();
    /// assert!(!NO_ERROR.is_set());
    /// assert!(!NO_ERROR.stack_trace().is_collected());
    /// ```
    #[inline]
    pub const fn empty() -> Self {
        Self {
            payload: RawPayload::empty(),
            trace: StackTrace::not_collected(),
        }
    }

    /// Wraps `value` and captures a full stack trace.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::new(404u16);
    /// assert_eq!(*error.get::<u16>(), 404);
    /// ```
    pub fn new<T: Payload>(value: T) -> Self {
        Self::with_trace_depth(value, 0)
    }

    /// Wraps `value` and captures a stack trace with the given depth.
    ///
    /// A negative depth skips collection, `0` collects the full trace and a
    /// positive depth limits the number of frames.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::with_trace_depth("hot path", -1);
    /// assert!(error.is_set());
    /// assert!(!error.stack_trace().is_collected());
    /// ```
    pub fn with_trace_depth<T: Payload>(value: T, depth: isize) -> Self {
        Self {
            payload: RawPayload::new(value),
            trace: StackTrace::capture(depth),
        }
    }

    /// Builds a `String` payload from the display output of `fragments`,
    /// joined by `separator` and followed by `terminator`, and captures a full
    /// stack trace.
    ///
    /// # Panics
    ///
    /// Panics if one of the fragments' [`Display`](fmt::Display)
    /// implementations returns an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::fmt::Display;
    ///
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::from_fragments([&"retry" as &dyn Display, &3, &"failed"], ", ", ".");
    /// assert_eq!(error.to_string(), "retry, 3, failed.");
    /// ```
    #[track_caller]
    pub fn from_fragments<I>(fragments: I, separator: &str, terminator: &str) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        use core::fmt::Write as _;

        let mut message = String::new();
        for (index, fragment) in fragments.into_iter().enumerate() {
            if index > 0 {
                message.push_str(separator);
            }
            if write!(message, "{fragment}").is_err() {
                panic!("a Display implementation returned an error while building an error value");
            }
        }
        message.push_str(terminator);
        Self::new(message)
    }

    /// Returns `true` if this error value holds a payload.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.payload.is_alive()
    }

    /// Returns `true` if the payload is of type `T`. Always `false` for an
    /// empty error value.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::new(1.5f64);
    /// assert!(error.is_a::<f64>());
    /// assert!(!error.is_a::<f32>());
    /// ```
    #[inline]
    pub fn is_a<T: 'static>(&self) -> bool {
        self.payload.is_a::<T>()
    }

    /// Returns the type name of the payload, or `None` if the error value is
    /// empty. The name is only meant for diagnostics.
    #[inline]
    pub fn payload_type_name(&self) -> Option<&'static str> {
        self.payload.payload_type_name()
    }

    /// Returns a reference to the payload.
    ///
    /// # Panics
    ///
    /// Panics if the payload is not of type `T` or the error value is empty.
    /// Use [`ErrorValue::downcast_ref`] to check for a type instead.
    ///
    /// ```should_panic
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::new(7u8);
    /// let _ = error.get::<String>();
    /// ```
    #[track_caller]
    pub fn get<T: 'static>(&self) -> &T {
        if !self.is_a::<T>() {
            self.type_mismatch::<T>();
        }
        // SAFETY: The payload was just checked to be a `T`.
        unsafe { self.payload.downcast_unchecked::<T>() }
    }

    /// Returns a mutable reference to the payload.
    ///
    /// # Panics
    ///
    /// Panics if the payload is not of type `T` or the error value is empty.
    #[track_caller]
    pub fn get_mut<T: 'static>(&mut self) -> &mut T {
        if !self.is_a::<T>() {
            self.type_mismatch::<T>();
        }
        // SAFETY: The payload was just checked to be a `T`.
        unsafe { self.payload.downcast_mut_unchecked::<T>() }
    }

    /// Returns a reference to the payload without checking its type.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The payload is of type `T`, i.e. [`ErrorValue::is_a::<T>`] returns
    ///    `true`.
    #[inline]
    pub unsafe fn get_unchecked<T: 'static>(&self) -> &T {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.payload.downcast_unchecked::<T>() }
    }

    /// Returns a mutable reference to the payload without checking its type.
    ///
    /// # Safety
    ///
    /// Same requirements as [`ErrorValue::get_unchecked`].
    #[inline]
    pub unsafe fn get_unchecked_mut<T: 'static>(&mut self) -> &mut T {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.payload.downcast_mut_unchecked::<T>() }
    }

    /// Returns a reference to the payload if it is of type `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::new(String::from("timeout"));
    /// assert_eq!(error.downcast_ref::<String>().map(String::as_str), Some("timeout"));
    /// assert!(error.downcast_ref::<u32>().is_none());
    /// ```
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.is_a::<T>() {
            // SAFETY: The payload was just checked to be a `T`.
            Some(unsafe { self.payload.downcast_unchecked::<T>() })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the payload if it is of type `T`.
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.is_a::<T>() {
            // SAFETY: The payload was just checked to be a `T`.
            Some(unsafe { self.payload.downcast_mut_unchecked::<T>() })
        } else {
            None
        }
    }

    /// Moves the payload out if it is of type `T`, otherwise gives the error
    /// value back unchanged. The stack trace is dropped on success.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// let error = ErrorValue::new(5i64);
    /// let error = error.downcast::<u64>().unwrap_err();
    /// assert_eq!(error.downcast::<i64>().ok(), Some(5));
    /// ```
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if !self.is_a::<T>() {
            return Err(self);
        }
        let Self { payload, trace } = self;
        drop(trace);
        // SAFETY: The payload was just checked to be a `T`.
        Ok(unsafe { payload.into_inner_unchecked::<T>() })
    }

    /// Returns a shared copy of the stack trace captured at creation.
    #[inline]
    pub fn stack_trace(&self) -> StackTrace {
        self.trace.clone()
    }

    /// Converts the error value into a [`Result`]: `Err(self)` if it holds a
    /// payload, `Ok(())` otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::ErrorValue;
    ///
    /// fn step() -> polyerr::Result<()> {
    ///     ErrorValue::empty().into_result()?;
    ///     ErrorValue::new("disk full").into_result()?;
    ///     Ok(())
    /// }
    ///
    /// assert_eq!(step().unwrap_err().to_string(), "disk full");
    /// ```
    #[inline]
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_set() { Err(self) } else { Ok(()) }
    }

    #[cold]
    #[inline(never)]
    #[track_caller]
    fn type_mismatch<T: 'static>(&self) -> ! {
        let found = self.payload_type_name().unwrap_or("<empty>");
        let expected = type_name::<T>();

        #[cfg(feature = "tracing")]
        tracing::error!(found, expected, "error payload accessed as the wrong type");

        panic!("attempted to access error payload of type `{found}` as `{expected}`")
    }
}

impl From<&str> for ErrorValue {
    fn from(message: &str) -> Self {
        Self::new(String::from(message))
    }
}

impl From<String> for ErrorValue {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&ErrorValue> for bool {
    #[inline]
    fn from(error: &ErrorValue) -> Self {
        error.is_set()
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.payload.display(f)
    }
}

/// Displays a payload with default formatting options, whatever options the
/// outer formatter carries.
struct PayloadDisplay<'a>(&'a RawPayload);

impl fmt::Display for PayloadDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display(f)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error({})", PayloadDisplay(&self.payload))?;
        if f.alternate() {
            write!(f, "\n\nstack trace:\n{}", self.trace)?;
        }
        Ok(())
    }
}

impl core::error::Error for ErrorValue {}
