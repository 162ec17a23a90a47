//! Stack trace capture policy with an installed collector.
//!
//! Installing hooks is global, so this file is its own test binary and holds
//! a single test.

use std::sync::atomic::{AtomicUsize, Ordering};

use polyerr::{
    ErrorValue, StackTrace, error,
    hooks::{Hooks, LeakedHooks},
};

static CALLS: AtomicUsize = AtomicUsize::new(0);
static LAST_MAX_FRAMES: AtomicUsize = AtomicUsize::new(usize::MAX);

fn counting_collector(max_frames: usize) -> Vec<u8> {
    CALLS.fetch_add(1, Ordering::SeqCst);
    LAST_MAX_FRAMES.store(max_frames, Ordering::SeqCst);
    b"main - src/main.rs:1".to_vec()
}

fn calls() -> usize {
    CALLS.load(Ordering::SeqCst)
}

#[test]
fn test_trace_capture_policy() {
    assert!(LeakedHooks::fetch_current_hooks().is_none());
    Hooks::new()
        .trace_collector(counting_collector)
        .install()
        .expect("hooks were already installed");
    assert!(LeakedHooks::fetch_current_hooks().is_some());

    // Installing twice fails and hands the hooks back
    let second = Hooks::new().install();
    assert!(second.is_err());

    // Default construction never collects
    let empty = ErrorValue::default();
    let also_empty = ErrorValue::empty();
    assert_eq!(calls(), 0);
    assert!(!empty.stack_trace().is_collected());
    assert!(!also_empty.stack_trace().is_collected());

    // Wrapping a payload collects exactly once, with full depth
    let error = ErrorValue::new(17u32);
    assert_eq!(calls(), 1);
    assert_eq!(LAST_MAX_FRAMES.load(Ordering::SeqCst), 0);
    assert_eq!(error.stack_trace().as_str(), Some("main - src/main.rs:1"));

    // A negative depth never collects
    let quiet = ErrorValue::with_trace_depth(17u32, -1);
    assert_eq!(calls(), 1);
    assert!(!quiet.stack_trace().is_collected());

    // A positive depth is forwarded
    let _limited = ErrorValue::with_trace_depth(17u32, 3);
    assert_eq!(calls(), 2);
    assert_eq!(LAST_MAX_FRAMES.load(Ordering::SeqCst), 3);

    // Copies share the trace instead of collecting again
    let copy = error.clone();
    assert_eq!(calls(), 2);
    assert!(copy.stack_trace().ptr_eq(&error.stack_trace()));
    assert!(format!("{copy:#?}").ends_with("stack trace:\nmain - src/main.rs:1"));

    // Fragment construction collects once
    let built = error!("code ", 5);
    assert_eq!(calls(), 3);
    assert!(built.stack_trace().is_collected());

    // Replacing the hooks switches the collector for later captures
    let previous = Hooks::new()
        .trace_collector(|_: usize| Vec::new())
        .replace();
    let previous = previous.expect("the counting collector was installed");
    let untraced = ErrorValue::new("late");
    assert_eq!(calls(), 3);
    assert!(!untraced.stack_trace().is_collected());
    assert!(StackTrace::capture(0).ptr_eq(&StackTrace::not_collected()));

    // The counting collector is no longer installed and nothing captures
    // concurrently, so its hooks can be freed
    // SAFETY: See above.
    drop(unsafe { previous.reclaim() });
    assert_eq!(calls(), 3);
}
