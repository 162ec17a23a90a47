/// Creates an [`ErrorValue`] holding a `String` built from displayable
/// fragments.
///
/// The fragments are concatenated with no separator and no terminator, and a
/// full stack trace is captured. Use [`ErrorValue::from_fragments`] to choose
/// a separator or terminator.
///
/// [`ErrorValue`]: crate::ErrorValue
/// [`ErrorValue::from_fragments`]: crate::ErrorValue::from_fragments
///
/// # Examples
///
/// ```
/// use polyerr::error;
///
/// let error = error!("mojo ", 42);
/// assert_eq!(error.to_string(), "mojo 42");
/// assert!(error.is_a::<String>());
///
/// let error = error!("bad");
/// assert_eq!(format!("{error:?}"), "Error(bad)");
/// ```
#[macro_export]
macro_rules! error {
    ($($fragment:expr),+ $(,)?) => {
        $crate::ErrorValue::from_fragments(
            [$(&$fragment as &dyn $crate::__private::Display),+],
            "",
            "",
        )
    };
}

/// Return early with an error.
///
/// Builds an error value with the same arguments as the [`error!`] macro and
/// returns it wrapped in an `Err`.
///
/// This is equivalent to writing `return Err(error!(...).into());`
///
/// # Examples
///
/// ```
/// use polyerr::prelude::*;
///
/// fn check_len(len: usize) -> polyerr::Result<()> {
///     if len > 8 {
///         bail!("length ", len, " exceeds the limit of 8");
///     }
///     Ok(())
/// }
///
/// assert!(check_len(3).is_ok());
/// assert_eq!(
///     check_len(9).unwrap_err().to_string(),
///     "length 9 exceeds the limit of 8"
/// );
/// ```
#[macro_export]
macro_rules! bail {
    ($($args:tt)*) => {
        return $crate::__private::Err($crate::error!($($args)*).into())
    };
}
