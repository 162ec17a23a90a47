//! Operation table for type-erased payloads.
//!
//! This module contains the [`OperationTable`] which enables calling
//! destroy/clone/display/type-check operations on a payload whose concrete
//! type `T` has been erased. Unlike a classic vtable with one function pointer
//! per method, the table holds a single dispatch function that receives an
//! [`Operation`] code together with untyped input and output pointers.
//!
//! This module encapsulates the field of [`OperationTable`] so it cannot be
//! accessed directly. This visibility restriction guarantees the safety
//! invariant: **the dispatch function is either [`dispatch_empty`] or
//! [`dispatch::<T>`] for the payload type `T` stored in the paired
//! [`TrapezoidStorage`]**.

use core::{any::TypeId, fmt, mem::MaybeUninit};

use crate::payload::{raw::RawPayload, storage::TrapezoidStorage};

/// Operation codes understood by an [`OperationTable`].
///
/// Every operation documents the input and output regions the caller has to
/// supply.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Operation {
    /// Input: `*mut TrapezoidStorage`. Output: unused.
    Destroy,
    /// Input: `*const TrapezoidStorage`. Output: `*mut MaybeUninit<RawPayload>`.
    Clone,
    /// Input: `*const TrapezoidStorage`. Output: `*mut fmt::Formatter<'_>`.
    Display,
    /// Input: `*const TypeId`. Output: `*mut bool`.
    IsA,
    /// Input: unused. Output: `*mut &'static str`.
    TypeName,
    /// Input: unused. Output: unused.
    IsAlive,
}

/// Signature of a dispatch function.
///
/// Returns `true` if the operation was performed.
type DispatchFn = unsafe fn(Operation, *const (), *mut ()) -> bool;

/// A single-entry operation table.
///
/// # Safety Invariant
///
/// The `dispatch` field points either to [`dispatch_empty`] or to
/// [`dispatch::<T>`] for the type `T` that the table was created for.
#[derive(Copy, Clone)]
pub(crate) struct OperationTable {
    /// The dispatch function. This is the only stored field.
    dispatch: DispatchFn,
}

impl OperationTable {
    /// The table used by empty payloads. Every operation is a no-op that
    /// reports `false`.
    pub(crate) const EMPTY: Self = Self {
        dispatch: dispatch_empty,
    };

    /// Creates the table for the payload type `T`.
    #[inline]
    pub(crate) const fn new<T>() -> Self
    where
        T: Clone + fmt::Display + 'static,
    {
        Self {
            dispatch: dispatch::<T>,
        }
    }

    /// Returns `true` if this table belongs to a payload that holds a value.
    #[inline]
    pub(crate) fn is_alive(self) -> bool {
        // SAFETY: `IsAlive` reads neither input nor output.
        unsafe {
            (self.dispatch)(
                Operation::IsAlive,
                core::ptr::null(),
                core::ptr::null_mut(),
            )
        }
    }

    /// Returns `true` if this table was created for the type identified by
    /// `type_id`.
    #[inline]
    pub(crate) fn is_a(self, type_id: TypeId) -> bool {
        let mut matches = false;
        // SAFETY: The input is a valid `TypeId` and the output a valid `bool`,
        // both live for the duration of the call.
        unsafe {
            (self.dispatch)(
                Operation::IsA,
                (&raw const type_id).cast::<()>(),
                (&raw mut matches).cast::<()>(),
            );
        }
        matches
    }

    /// Returns the [`core::any::type_name`] of the payload type, or `None` for
    /// the empty table.
    #[inline]
    pub(crate) fn type_name(self) -> Option<&'static str> {
        let mut name: &'static str = "";
        // SAFETY: The output is a valid `&'static str` slot.
        let performed = unsafe {
            (self.dispatch)(
                Operation::TypeName,
                core::ptr::null(),
                (&raw mut name).cast::<()>(),
            )
        };
        performed.then_some(name)
    }

    /// Drops the payload held by `storage`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This table is the table paired with `storage`.
    /// 2. The payload has not been released or taken, and is not accessed
    ///    again after this call.
    #[inline]
    pub(crate) unsafe fn destroy(self, storage: &mut TrapezoidStorage) {
        // SAFETY: Guaranteed by the caller; the input is a valid storage.
        unsafe {
            (self.dispatch)(
                Operation::Destroy,
                (storage as *mut TrapezoidStorage).cast_const().cast::<()>(),
                core::ptr::null_mut(),
            );
        }
    }

    /// Clones the payload held by `storage` into a new [`RawPayload`] that
    /// uses this same table.
    ///
    /// Cloning an empty payload gives an empty payload.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This table is the table paired with `storage`.
    /// 2. The payload has not been released or taken.
    #[inline]
    pub(crate) unsafe fn clone_payload(self, storage: &TrapezoidStorage) -> RawPayload {
        let mut out: MaybeUninit<RawPayload> = MaybeUninit::uninit();
        // SAFETY: Guaranteed by the caller; the output is a valid uninitialized
        // `RawPayload` slot.
        let performed = unsafe {
            (self.dispatch)(
                Operation::Clone,
                (storage as *const TrapezoidStorage).cast::<()>(),
                (&raw mut out).cast::<()>(),
            )
        };
        if performed {
            // SAFETY: A performed `Clone` operation initializes the output.
            unsafe { out.assume_init() }
        } else {
            RawPayload::empty()
        }
    }

    /// Formats the payload held by `storage` with its `Display` impl.
    ///
    /// The empty table writes nothing.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This table is the table paired with `storage`.
    /// 2. The payload has not been released or taken.
    #[inline]
    pub(crate) unsafe fn display(
        self,
        storage: &TrapezoidStorage,
        formatter: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let alive = self.is_alive();
        // SAFETY: Guaranteed by the caller; the output is a valid formatter.
        let performed = unsafe {
            (self.dispatch)(
                Operation::Display,
                (storage as *const TrapezoidStorage).cast::<()>(),
                (formatter as *mut fmt::Formatter<'_>).cast::<()>(),
            )
        };
        if performed || !alive {
            Ok(())
        } else {
            Err(fmt::Error)
        }
    }
}

/// Dispatch function of the empty table. Every operation is a no-op.
unsafe fn dispatch_empty(_operation: Operation, _input: *const (), _output: *mut ()) -> bool {
    false
}

/// Dispatch function for payloads of type `T`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The input and output pointers match the contract documented on the
///    [`Operation`] variant.
/// 2. Any storage passed in was created with [`TrapezoidStorage::new::<T>`]
///    and still holds its value.
unsafe fn dispatch<T>(operation: Operation, input: *const (), output: *mut ()) -> bool
where
    T: Clone + fmt::Display + 'static,
{
    match operation {
        Operation::Destroy => {
            let storage = input.cast::<TrapezoidStorage>().cast_mut();
            // SAFETY: The storage is valid, holds a `T`, and the caller hands over
            // the value for destruction.
            unsafe { (*storage).release::<T>() }
        }
        Operation::Clone => {
            // SAFETY: The storage is valid and holds a `T`.
            let value: &T = unsafe { (*input.cast::<TrapezoidStorage>()).get::<T>() };
            let out = output.cast::<MaybeUninit<RawPayload>>();
            // SAFETY: The output points to a valid uninitialized slot.
            unsafe {
                (*out).write(RawPayload::new(value.clone()));
            }
        }
        Operation::Display => {
            // SAFETY: The storage is valid and holds a `T`.
            let value: &T = unsafe { (*input.cast::<TrapezoidStorage>()).get::<T>() };
            // SAFETY: The output points to a formatter that is uniquely borrowed
            // for the duration of this call.
            let formatter: &mut fmt::Formatter<'_> =
                unsafe { &mut *output.cast::<fmt::Formatter<'_>>() };
            return fmt::Display::fmt(value, formatter).is_ok();
        }
        Operation::IsA => {
            // SAFETY: The input points to a valid `TypeId`.
            let candidate: TypeId = unsafe { *input.cast::<TypeId>() };
            // SAFETY: The output points to a valid `bool`.
            unsafe {
                *output.cast::<bool>() = candidate == TypeId::of::<T>();
            }
        }
        Operation::TypeName => {
            // SAFETY: The output points to a valid `&'static str`.
            unsafe {
                *output.cast::<&'static str>() = core::any::type_name::<T>();
            }
        }
        Operation::IsAlive => {}
    }
    true
}
