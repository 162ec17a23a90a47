//! Hooks for configuring how stack traces are collected.
//!
//! # Quick Start
//!
//! ```rust
//! use polyerr::{ErrorValue, hooks::Hooks};
//!
//! // Use a custom collector for every error value created from now on,
//! // replacing any hooks installed earlier
//! Hooks::new()
//!     .trace_collector(|_max_frames: usize| b"frame 0 - src/main.rs:10".to_vec())
//!     .replace();
//!
//! let error = ErrorValue::new("disk full");
//! assert_eq!(error.stack_trace().to_string(), "frame 0 - src/main.rs:10");
//! ```
//!
//! # Default Behavior
//!
//! When no collector has been installed, the built-in collector is used:
//!
//! - with the `backtrace` feature, [`BacktraceCollector`] walks the stack if
//!   the environment opts in with `POLYERR_BACKTRACE=1`
//! - without it, no stack traces are collected
//!
//! Error values created with [`ErrorValue::empty`] never collect a trace,
//! whatever the installed collector.
//!
//! [`BacktraceCollector`]: builtin_hooks::backtrace::BacktraceCollector
//! [`ErrorValue::empty`]: crate::ErrorValue::empty

pub mod builtin_hooks;
mod trace_collector;

use alloc::{boxed::Box, vec::Vec};
use core::{
    panic::Location,
    ptr::NonNull,
    sync::atomic::{AtomicPtr, Ordering},
};

pub use self::trace_collector::{DisabledCollector, TraceCollector};

/// Builder for configuring and installing hooks globally.
///
/// # Examples
///
/// Turn off stack trace collection entirely:
///
/// ```rust
/// use polyerr::hooks::{DisabledCollector, Hooks};
///
/// Hooks::new()
///     .trace_collector(DisabledCollector)
///     .install()
///     .expect("failed to install hooks");
/// ```
#[derive(Debug)]
pub struct Hooks(Box<HookData>);

impl Default for Hooks {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct HookData {
    pub(crate) trace_collector: Option<Box<dyn TraceCollector>>,
    /// Name of the collector type, kept for debugging output.
    trace_collector_name: Option<&'static str>,
    #[allow(dead_code, reason = "only used for debugging purposes")]
    created_at: &'static Location<'static>,
}

impl core::fmt::Debug for HookData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HookData")
            .field("trace_collector", &self.trace_collector_name)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Returned by [`Hooks::install`] when a collector is already installed.
///
/// Holds the rejected hooks, so they can be passed to [`Hooks::replace`]
/// instead.
pub struct HooksAlreadyInstalledError(pub Hooks);

impl core::fmt::Debug for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("HooksAlreadyInstalledError")
            .field(&self.0)
            .finish()
    }
}

impl core::fmt::Display for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("a trace collector is already installed")
    }
}

impl core::error::Error for HooksAlreadyInstalledError {}

impl Hooks {
    /// Creates a new `Hooks` builder that keeps the built-in collector.
    #[track_caller]
    pub fn new() -> Self {
        Self(Box::new(HookData {
            trace_collector: None,
            trace_collector_name: None,
            created_at: Location::caller(),
        }))
    }

    /// Sets the collector used for every stack trace captured through
    /// [`StackTrace::capture`](crate::StackTrace::capture).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polyerr::hooks::Hooks;
    ///
    /// let hooks = Hooks::new().trace_collector(|max_frames: usize| {
    ///     format!("collected with max_frames = {max_frames}").into_bytes()
    /// });
    /// # drop(hooks);
    /// ```
    pub fn trace_collector<C>(mut self, collector: C) -> Self
    where
        C: TraceCollector,
    {
        self.0.trace_collector = Some(Box::new(collector));
        self.0.trace_collector_name = Some(core::any::type_name::<C>());
        self
    }

    /// Installs the hooks, unless hooks are already installed.
    ///
    /// Installed hooks are leaked: error values may capture traces from any
    /// thread at any time, so the collector has to outlive every caller.
    pub fn install(self) -> Result<(), HooksAlreadyInstalledError> {
        let leaked = self.leak();
        if HOOKS.install(leaked.hook_data) {
            return Ok(());
        }

        // SAFETY: The slot was occupied, so `leaked` was never published and
        // this is the only handle to it.
        let hooks = unsafe { leaked.reclaim() };
        Err(HooksAlreadyInstalledError(hooks))
    }

    /// Replaces the currently installed hooks with `self`.
    ///
    /// Returns the previously installed hooks, if any, as a [`LeakedHooks`]
    /// handle.
    pub fn replace(self) -> Option<LeakedHooks> {
        self.leak().replace()
    }

    /// Leaks the hooks, returning a [`LeakedHooks`] handle.
    pub fn leak(self) -> LeakedHooks {
        LeakedHooks {
            hook_data: NonNull::from(Box::leak(self.0)),
        }
    }
}

/// A handle to leaked hooks, which can be installed again with
/// [`LeakedHooks::replace`].
#[derive(Copy, Clone, Debug)]
pub struct LeakedHooks {
    /// # Safety
    ///
    /// Comes from `Box::leak` and stays valid until passed to
    /// [`LeakedHooks::reclaim`].
    hook_data: NonNull<HookData>,
}

impl LeakedHooks {
    /// Fetches the currently installed hooks, if any.
    pub fn fetch_current_hooks() -> Option<Self> {
        Some(Self {
            hook_data: HOOKS.fetch()?,
        })
    }

    /// Replaces the currently installed hooks with `self`.
    ///
    /// Returns the previously installed hooks, if any.
    pub fn replace(self) -> Option<LeakedHooks> {
        Some(Self {
            hook_data: HOOKS.replace(self.hook_data)?,
        })
    }

    /// Takes back ownership of the hooks, freeing them when the returned
    /// [`Hooks`] is dropped.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. These hooks are not installed, and no copy of this handle is
    ///    installed or used afterwards.
    /// 2. No capture that fetched these hooks is still running, on any
    ///    thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use polyerr::hooks::{DisabledCollector, Hooks};
    ///
    /// let leaked = Hooks::new().trace_collector(DisabledCollector).leak();
    /// // SAFETY: The hooks were never installed.
    /// drop(unsafe { leaked.reclaim() });
    /// ```
    pub unsafe fn reclaim(self) -> Hooks {
        // SAFETY: The pointer came from `Box::leak` and the caller guarantees
        // it is no longer shared.
        Hooks(unsafe { Box::from_raw(self.hook_data.as_ptr()) })
    }
}

/// The slot holding the installed hooks.
struct GlobalHooks {
    /// # Safety
    ///
    /// Null, or a pointer from `Box::leak`. Stores publish with release and
    /// loads that dereference use acquire.
    ptr: AtomicPtr<HookData>,
}

impl GlobalHooks {
    const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    fn fetch(&self) -> Option<NonNull<HookData>> {
        NonNull::new(self.ptr.load(Ordering::Acquire))
    }

    /// Publishes `new` if the slot is empty. Returns `false`, leaving `new`
    /// unpublished, otherwise.
    fn install(&self, new: NonNull<HookData>) -> bool {
        self.ptr
            .compare_exchange(
                core::ptr::null_mut(),
                new.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    fn replace(&self, new: NonNull<HookData>) -> Option<NonNull<HookData>> {
        NonNull::new(self.ptr.swap(new.as_ptr(), Ordering::AcqRel))
    }
}

// SAFETY: `HookData` is never mutated once leaked and its collector is
// `Send + Sync`.
unsafe impl Send for LeakedHooks {}
// SAFETY: See the `Send` impl above.
unsafe impl Sync for LeakedHooks {}

static HOOKS: GlobalHooks = GlobalHooks::new();

impl HookData {
    pub(crate) fn fetch() -> Option<&'static HookData> {
        let ptr = HOOKS.fetch()?;

        // SAFETY: Installed hooks are leaked and never reclaimed while
        // installed.
        let hooks = unsafe { ptr.as_ref() };

        Some(hooks)
    }
}

/// Renders the current stack trace with the installed collector, falling back
/// to the built-in one.
pub(crate) fn collect_trace(max_frames: usize) -> Vec<u8> {
    match HookData::fetch().and_then(|hooks| hooks.trace_collector.as_deref()) {
        Some(collector) => collector.capture(max_frames),
        None => builtin_hooks::default_capture(max_frames),
    }
}
