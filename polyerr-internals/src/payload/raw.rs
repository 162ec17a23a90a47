//! Type-erased owned payload.
//!
//! This module encapsulates the fields of [`RawPayload`], ensuring they are
//! only visible within this module. This visibility restriction guarantees the
//! safety invariant: **the storage and the operation table are always created
//! together for the same payload type, and are never replaced independently**.
//!
//! # Safety Invariant
//!
//! The fields can only be set via [`RawPayload::new`] (which builds both from
//! the same `T`) or [`RawPayload::empty`] (which pairs an empty storage with
//! the empty table). Since neither field is ever reassigned, the table always
//! describes the contents of the storage.

use core::{any::TypeId, fmt};

use crate::payload::{storage::TrapezoidStorage, vtable::OperationTable};

/// An owned payload of some concrete type `T`, though we do not know which
/// actual `T` it is.
///
/// A [`RawPayload`] is three pointers wide: two words of small-buffer storage
/// and one dispatch function. It may also be empty, which is the "no error"
/// state.
///
/// # Examples
///
/// ```
/// use polyerr_internals::RawPayload;
///
/// let payload = RawPayload::new(42u32);
/// assert!(payload.is_alive());
/// assert!(payload.is_a::<u32>());
///
/// let copy = payload.clone();
/// // SAFETY: The payload holds a `u32`.
/// assert_eq!(unsafe { *copy.downcast_unchecked::<u32>() }, 42);
///
/// assert!(!RawPayload::empty().is_alive());
/// ```
pub struct RawPayload {
    /// The payload bytes, inline or boxed.
    ///
    /// # Safety
    ///
    /// 1. The storage was created together with `table` for the same payload
    ///    type, or is empty and `table` is [`OperationTable::EMPTY`].
    /// 2. The payload is initialized for the entire lifetime of this object,
    ///    except inside the `Drop` implementation and
    ///    [`RawPayload::into_inner_unchecked`].
    storage: TrapezoidStorage,
    /// The operation table describing `storage`.
    table: OperationTable,
}

impl RawPayload {
    /// Creates an empty payload.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            storage: TrapezoidStorage::empty(),
            table: OperationTable::EMPTY,
        }
    }

    /// Creates a payload holding `value`.
    #[inline]
    pub fn new<T>(value: T) -> Self
    where
        T: Clone + fmt::Display + 'static,
    {
        Self {
            storage: TrapezoidStorage::new(value),
            table: OperationTable::new::<T>(),
        }
    }

    /// Returns `true` if this payload holds a value.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.table.is_alive()
    }

    /// Returns `true` if this payload holds a value of type `T`.
    #[inline]
    pub fn is_a<T: 'static>(&self) -> bool {
        self.table.is_a(TypeId::of::<T>())
    }

    /// Returns the [`core::any::type_name`] of the held value, or `None` if
    /// the payload is empty.
    #[inline]
    pub fn payload_type_name(&self) -> Option<&'static str> {
        self.table.type_name()
    }

    /// Formats the held value using its [`Display`](fmt::Display) impl.
    /// Empty payloads write nothing.
    #[inline]
    pub fn display(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: The table and storage are paired and the payload is initialized.
        unsafe { self.table.display(&self.storage, formatter) }
    }

    /// Returns a reference to the held value.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The payload holds a value of type `T`, i.e. [`RawPayload::is_a::<T>`]
    ///    returns `true`.
    #[inline]
    pub unsafe fn downcast_unchecked<T: 'static>(&self) -> &T {
        debug_assert!(self.is_a::<T>());
        // SAFETY: The storage was created with `T`, as guaranteed by the caller.
        unsafe { self.storage.get::<T>() }
    }

    /// Returns a mutable reference to the held value.
    ///
    /// # Safety
    ///
    /// Same requirements as [`RawPayload::downcast_unchecked`].
    #[inline]
    pub unsafe fn downcast_mut_unchecked<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.is_a::<T>());
        // SAFETY: The storage was created with `T`, as guaranteed by the caller.
        unsafe { self.storage.get_mut::<T>() }
    }

    /// Moves the held value out of the payload.
    ///
    /// # Safety
    ///
    /// Same requirements as [`RawPayload::downcast_unchecked`].
    #[inline]
    pub unsafe fn into_inner_unchecked<T: 'static>(self) -> T {
        debug_assert!(self.is_a::<T>());
        let mut this = core::mem::ManuallyDrop::new(self);
        // SAFETY: The storage was created with `T`, as guaranteed by the caller.
        // The `ManuallyDrop` wrapper makes sure the value is not destroyed again.
        unsafe { this.storage.take::<T>() }
    }
}

impl Clone for RawPayload {
    #[inline]
    fn clone(&self) -> Self {
        // SAFETY: The table and storage are paired and the payload is initialized.
        unsafe { self.table.clone_payload(&self.storage) }
    }
}

impl Default for RawPayload {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl core::ops::Drop for RawPayload {
    #[inline]
    fn drop(&mut self) {
        let table = self.table;
        // SAFETY:
        // 1. The table is paired with the storage.
        // 2. The payload is initialized and is not used after this call, as we
        //    are in the drop function.
        unsafe {
            table.destroy(&mut self.storage);
        }
    }
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPayload")
            .field("type_name", &self.payload_type_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::String};

    use super::*;

    struct Shown<'a>(&'a RawPayload);

    impl fmt::Display for Shown<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.display(f)
        }
    }

    #[test]
    fn test_raw_payload_size() {
        assert_eq!(
            core::mem::size_of::<RawPayload>(),
            3 * core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_empty_payload() {
        let payload = RawPayload::empty();
        assert!(!payload.is_alive());
        assert!(!payload.is_a::<()>());
        assert_eq!(payload.payload_type_name(), None);
        assert_eq!(format!("{}", Shown(&payload)), "");

        let copy = payload.clone();
        assert!(!copy.is_alive());
    }

    #[test]
    fn test_payload_display() {
        let int_payload = RawPayload::new(42i32);
        let string_payload = RawPayload::new(String::from("test"));

        assert_eq!(format!("{}", Shown(&int_payload)), "42");
        assert_eq!(format!("{}", Shown(&string_payload)), "test");
    }

    #[test]
    fn test_payload_into_inner() {
        let payload = RawPayload::new(String::from("owned"));
        assert!(payload.is_a::<String>());
        // SAFETY: The payload holds a `String`.
        let value = unsafe { payload.into_inner_unchecked::<String>() };
        assert_eq!(value, "owned");
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_not_impl_any!(RawPayload: Send, Sync);
    }
}
