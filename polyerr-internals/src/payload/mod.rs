//! Module containing the type-erased payload and its building blocks.

mod raw;
mod storage;
mod vtable;

pub use self::{raw::RawPayload, storage::StorageMode};
