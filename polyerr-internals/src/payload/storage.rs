//! Small-buffer storage for type-erased payloads.
//!
//! This module encapsulates the bytes of [`TrapezoidStorage`]. A storage
//! instance holds a payload of some type `T` either inline in its two-word
//! buffer or behind a pointer to a heap block created by [`Box::into_raw`].
//!
//! # Safety Invariant
//!
//! The storage does not record which of the two layouts it uses. The layout is
//! a pure function of `T` (see [`StorageMode::of`]), so every operation that
//! touches the payload must be instantiated with the same `T` that was used to
//! create the storage. The [`OperationTable`] paired with the storage in
//! [`RawPayload`] is what remembers `T`.
//!
//! [`OperationTable`]: crate::payload::vtable::OperationTable
//! [`RawPayload`]: crate::RawPayload

use alloc::boxed::Box;
use core::{cell::UnsafeCell, mem::MaybeUninit, ptr::NonNull};

/// Where a payload of a given type lives inside a [`TrapezoidStorage`].
///
/// The mode is a static property of the payload type and is never stored at
/// runtime.
///
/// # Examples
///
/// ```
/// use polyerr_internals::StorageMode;
///
/// assert_eq!(StorageMode::of::<u64>(), StorageMode::Inline);
/// assert_eq!(StorageMode::of::<[usize; 2]>(), StorageMode::Inline);
/// assert_eq!(StorageMode::of::<[usize; 3]>(), StorageMode::Boxed);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum StorageMode {
    /// The payload bytes are stored directly in the buffer.
    Inline,
    /// The buffer holds a pointer to a heap allocation containing the payload.
    Boxed,
}

impl StorageMode {
    /// Computes the storage mode used for payloads of type `T`.
    ///
    /// A payload is stored inline when it fits in the buffer and does not
    /// need a stricter alignment than the buffer has. Rust moves are always
    /// bitwise relocations, so no further condition applies.
    #[inline]
    pub const fn of<T>() -> Self {
        if core::mem::size_of::<T>() <= core::mem::size_of::<TrapezoidStorage>()
            && core::mem::align_of::<T>() <= core::mem::align_of::<TrapezoidStorage>()
        {
            Self::Inline
        } else {
            Self::Boxed
        }
    }

    /// Returns `true` for [`StorageMode::Inline`].
    #[inline]
    pub const fn is_inline(self) -> bool {
        matches!(self, Self::Inline)
    }
}

/// A two-pointer-wide, pointer-aligned buffer holding one payload.
///
/// The buffer is either unused (the empty state), holds the payload bytes
/// directly, or holds a pointer to a boxed payload in its first word.
///
/// The words sit in an [`UnsafeCell`] since inline payloads may have interior
/// mutability. Every typed pointer into the buffer is derived from
/// [`UnsafeCell::get`].
#[repr(C)]
pub(crate) struct TrapezoidStorage {
    /// The raw words of the buffer
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. If the storage was created with [`TrapezoidStorage::new::<T>`] and
    ///    `StorageMode::of::<T>()` is `Inline`, the buffer contains an
    ///    initialized `T` starting at offset zero until it is released or
    ///    taken.
    /// 2. If `StorageMode::of::<T>()` is `Boxed`, the first word contains a
    ///    pointer created by `Box::<T>::into_raw` until it is released or
    ///    taken.
    words: UnsafeCell<[MaybeUninit<*mut ()>; 2]>,
}

impl TrapezoidStorage {
    /// Creates a storage that holds no value.
    #[inline]
    pub(crate) const fn empty() -> Self {
        Self {
            words: UnsafeCell::new([MaybeUninit::new(core::ptr::null_mut()); 2]),
        }
    }

    /// Moves `value` into a new storage, inline or boxed depending on
    /// [`StorageMode::of::<T>`].
    #[inline]
    pub(crate) fn new<T>(value: T) -> Self {
        let mut storage = Self::empty();
        match StorageMode::of::<T>() {
            StorageMode::Inline => {
                let slot: *mut T = storage.words.get().cast::<T>();
                // SAFETY: `T` fits in the buffer and the buffer is at least as
                // aligned as `T`, as checked by `StorageMode::of`. The slot is
                // not initialized, so nothing is overwritten without being dropped.
                unsafe {
                    slot.write(value);
                }
            }
            StorageMode::Boxed => {
                let ptr: *mut T = Box::into_raw(Box::new(value));
                storage.words.get_mut()[0] = MaybeUninit::new(ptr.cast::<()>());
            }
        }
        storage
    }

    /// Returns a pointer to the `T` held by this storage.
    ///
    /// For inline payloads the pointer is derived from the cell, so it may be
    /// used for writes whenever the caller has the right to write.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The storage was created by [`TrapezoidStorage::new::<T>`] with this
    ///    exact `T`.
    /// 2. The value has not been released or taken.
    #[inline]
    unsafe fn value_ptr<T>(&self) -> NonNull<T> {
        let words = self.words.get().cast::<MaybeUninit<*mut ()>>();
        match StorageMode::of::<T>() {
            // SAFETY: `UnsafeCell::get` never returns null.
            StorageMode::Inline => unsafe { NonNull::new_unchecked(words.cast::<T>()) },
            StorageMode::Boxed => {
                // SAFETY: For boxed payloads the first word was initialized with the
                // pointer returned by `Box::into_raw`, as guaranteed by the caller.
                // Nothing writes to the words while the storage is shared.
                let ptr: *mut () = unsafe { words.read().assume_init() };
                // SAFETY: `Box::into_raw` never returns null.
                unsafe { NonNull::new_unchecked(ptr.cast::<T>()) }
            }
        }
    }

    /// Returns a shared reference to the `T` held by this storage.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The storage was created by [`TrapezoidStorage::new::<T>`] with this
    ///    exact `T`.
    /// 2. The value has not been released or taken.
    #[inline]
    pub(crate) unsafe fn get<T>(&self) -> &T {
        // SAFETY: Guaranteed by the caller.
        let ptr = unsafe { self.value_ptr::<T>() };
        // SAFETY: The pointee is an initialized `T` that lives as long as `self`.
        // Mutation through it is limited to what `T`'s own `UnsafeCell`s allow.
        unsafe { ptr.as_ref() }
    }

    /// Returns a mutable reference to the `T` held by this storage.
    ///
    /// # Safety
    ///
    /// Same requirements as [`TrapezoidStorage::get`].
    #[inline]
    pub(crate) unsafe fn get_mut<T>(&mut self) -> &mut T {
        // SAFETY: Guaranteed by the caller.
        let mut ptr = unsafe { self.value_ptr::<T>() };
        // SAFETY: The pointee is an initialized `T` and we hold the unique borrow
        // of the storage that owns it.
        unsafe { ptr.as_mut() }
    }

    /// Drops the `T` held by this storage and frees its heap block, if any.
    ///
    /// The storage must not be used to access the value afterwards.
    ///
    /// # Safety
    ///
    /// Same requirements as [`TrapezoidStorage::get`]. In addition, the value
    /// must not be accessed, released or taken again.
    #[inline]
    pub(crate) unsafe fn release<T>(&mut self) {
        // SAFETY: Guaranteed by the caller.
        let ptr = unsafe { self.value_ptr::<T>() };
        match StorageMode::of::<T>() {
            StorageMode::Inline => {
                // SAFETY: The buffer holds an initialized `T` that is dropped
                // exactly once, as guaranteed by the caller.
                unsafe { core::ptr::drop_in_place(ptr.as_ptr()) }
            }
            StorageMode::Boxed => {
                // SAFETY: The pointer came from `Box::<T>::into_raw` and ownership
                // is transferred back exactly once.
                let boxed: Box<T> = unsafe { Box::from_raw(ptr.as_ptr()) };
                drop(boxed);
            }
        }
    }

    /// Moves the `T` out of this storage, freeing its heap block if any.
    ///
    /// # Safety
    ///
    /// Same requirements as [`TrapezoidStorage::release`].
    #[inline]
    pub(crate) unsafe fn take<T>(&mut self) -> T {
        // SAFETY: Guaranteed by the caller.
        let ptr = unsafe { self.value_ptr::<T>() };
        match StorageMode::of::<T>() {
            StorageMode::Inline => {
                // SAFETY: The buffer holds an initialized `T`; the caller promises
                // not to use it again, so reading it out moves ownership.
                unsafe { ptr.read() }
            }
            StorageMode::Boxed => {
                // SAFETY: The pointer came from `Box::<T>::into_raw` and ownership
                // is transferred back exactly once.
                let boxed: Box<T> = unsafe { Box::from_raw(ptr.as_ptr()) };
                *boxed
            }
        }
    }
}
