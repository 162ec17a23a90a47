#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`polyerr`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased storage and the unsafe
//! operations that power the [`polyerr`] error value. It lets a value of any
//! `Clone + Display + 'static` type be held in a fixed-size container and
//! manipulated without knowing its concrete type.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`polyerr`] crate, not this one.
//!
//! # Architecture
//!
//! - [`TrapezoidStorage`]: a two-word, pointer-aligned small buffer. Payloads
//!   that fit are stored inline, larger or over-aligned payloads are boxed.
//!   The choice is a static property of the payload type ([`StorageMode`]) and
//!   is never stored at runtime.
//! - [`OperationTable`]: a single dispatch function per payload type, called
//!   with an operation code (destroy, clone, display, type check, type name,
//!   liveness). The table costs exactly one pointer per payload.
//! - [`RawPayload`]: pairs a storage with its table. An empty storage paired
//!   with the empty table is the "no error" state.
//!
//! # Safety Strategy
//!
//! Since the storage does not know which type it holds, every access must be
//! made with the type that created it. This crate maintains that through:
//!
//! - **Module-based encapsulation**: the fields of [`RawPayload`] are private
//!   to a single module, and the storage and table are only ever created
//!   together, so the table always matches the storage.
//! - **Static layout decisions**: the inline/boxed decision is recomputed from
//!   the payload type inside the monomorphized dispatch function, so it cannot
//!   disagree with the construction.
//! - **Documented dispatch contracts**: each [`Operation`] specifies the exact
//!   input and output regions its caller has to provide.
//!
//! [`polyerr`]: https://docs.rs/polyerr/latest/polyerr/
//! [`TrapezoidStorage`]: payload::storage::TrapezoidStorage
//! [`OperationTable`]: payload::vtable::OperationTable
//! [`Operation`]: payload::vtable::Operation

extern crate alloc;

mod payload;

pub use payload::{RawPayload, StorageMode};
