//! Integration tests for [`ErrorValue`].
//!
//! These tests never install hooks, so no stack traces are collected unless
//! the environment opts in through the built-in collector. The trace capture
//! policy is tested in `trace_policy.rs`.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use polyerr::{ErrorValue, StorageMode, error, prelude::*, stack_trace::NOT_COLLECTED_MESSAGE};

#[derive(Clone, Debug, PartialEq, derive_more::Display)]
#[display("not found: {_0}")]
struct NotFound(u32);

#[derive(Clone, Debug, PartialEq, derive_more::Display)]
#[display("permission denied for {user}")]
struct PermissionDenied {
    user: String,
}

#[derive(Clone, Debug, thiserror::Error)]
enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("invalid digit `{0}`")]
    InvalidDigit(char),
}

/// Counts clones and drops of a payload through shared counters.
#[derive(Debug)]
struct Counted {
    clones: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl Counted {
    fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let clones = Arc::new(AtomicUsize::new(0));
        let drops = Arc::new(AtomicUsize::new(0));
        let counted = Self {
            clones: Arc::clone(&clones),
            drops: Arc::clone(&drops),
        };
        (counted, clones, drops)
    }
}

impl Clone for Counted {
    fn clone(&self) -> Self {
        self.clones.fetch_add(1, Ordering::SeqCst);
        Self {
            clones: Arc::clone(&self.clones),
            drops: Arc::clone(&self.drops),
        }
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl fmt::Display for Counted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "counted({})", self.clones.load(Ordering::SeqCst))
    }
}

/// Exactly two pointers wide with pointer alignment.
#[derive(Clone, Debug, derive_more::Display)]
#[display("{_0}/{_1}")]
struct TwoWords(usize, usize);

/// One byte larger than `TwoWords`.
#[derive(Clone, Debug, derive_more::Display)]
#[display("{_0}/{_1}/{_2}")]
struct TwoWordsAndAByte(usize, usize, u8);

#[test]
fn test_default_is_empty() {
    for error in [ErrorValue::default(), ErrorValue::empty()] {
        assert!(!error.is_set());
        assert!(!bool::from(&error));
        assert_eq!(error.to_string(), "");
        assert_eq!(error.stack_trace().to_string(), NOT_COLLECTED_MESSAGE);
        assert!(!error.is_a::<String>());
        assert!(error.downcast_ref::<String>().is_none());
    }
}

#[test]
fn test_type_identity() {
    let error = ErrorValue::new(NotFound(3));
    assert!(error.is_set());
    assert!(bool::from(&error));
    assert!(error.is_a::<NotFound>());
    assert!(!error.is_a::<PermissionDenied>());
    assert!(!error.is_a::<u32>());
    assert_eq!(error.to_string(), "not found: 3");
    assert_eq!(error.get::<NotFound>(), &NotFound(3));
    assert_eq!(
        error.payload_type_name(),
        Some(std::any::type_name::<NotFound>())
    );

    let error = ErrorValue::new(PermissionDenied {
        user: "root".to_string(),
    });
    assert!(error.is_a::<PermissionDenied>());
    assert!(!error.is_a::<NotFound>());
    assert_eq!(error.get::<PermissionDenied>().user, "root");

    let error = ErrorValue::new(ParseError::InvalidDigit('x'));
    assert!(error.is_a::<ParseError>());
    assert_eq!(error.to_string(), "invalid digit `x`");
    assert!(matches!(
        error.downcast_ref::<ParseError>(),
        Some(ParseError::InvalidDigit('x'))
    ));
}

#[test]
fn test_clone_is_deep() {
    let mut original = ErrorValue::new(PermissionDenied {
        user: "alice".to_string(),
    });
    let copy = original.clone();

    original.get_mut::<PermissionDenied>().user.push_str("-changed");
    assert_eq!(original.to_string(), "permission denied for alice-changed");
    assert_eq!(copy.to_string(), "permission denied for alice");

    drop(original);
    assert_eq!(copy.get::<PermissionDenied>().user, "alice");
}

#[test]
fn test_clone_counts() {
    let (counted, clones, drops) = Counted::new();
    let error = ErrorValue::new(counted);
    assert_eq!(clones.load(Ordering::SeqCst), 0);

    let first = error.clone();
    assert_eq!(clones.load(Ordering::SeqCst), 1);
    let second = first.clone();
    assert_eq!(clones.load(Ordering::SeqCst), 2);

    // Moves never clone
    let moved = second;
    let moved_again = vec![moved];
    assert_eq!(clones.load(Ordering::SeqCst), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(moved_again);
    drop(first);
    drop(error);
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn test_drop_exactly_once_through_moves() {
    let (counted, _clones, drops) = Counted::new();
    let error = ErrorValue::new(counted);

    let boxed = Box::new(error);
    let unboxed = *boxed;
    let mut slot = Some(unboxed);
    let taken = slot.take();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(taken);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_downcast_moves_payload_out() {
    let (counted, clones, drops) = Counted::new();
    let error = ErrorValue::new(counted);

    let error = error.downcast::<String>().unwrap_err();
    assert!(error.is_set());

    let counted = error.downcast::<Counted>().unwrap();
    assert_eq!(clones.load(Ordering::SeqCst), 0);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(counted);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_inline_payload_moves_with_the_container() {
    assert_eq!(StorageMode::of::<TwoWords>(), StorageMode::Inline);

    let error = ErrorValue::new(TwoWords(1, 2));
    let before: *const TwoWords = error.get::<TwoWords>();
    let moved = Box::new(error);
    let after: *const TwoWords = moved.get::<TwoWords>();

    assert_ne!(before, after);
    assert_eq!(moved.to_string(), "1/2");
}

#[test]
fn test_boxed_payload_stays_in_place() {
    assert_eq!(StorageMode::of::<TwoWordsAndAByte>(), StorageMode::Boxed);

    let error = ErrorValue::new(TwoWordsAndAByte(1, 2, 3));
    let before: *const TwoWordsAndAByte = error.get::<TwoWordsAndAByte>();
    let moved = Box::new(error);
    let after: *const TwoWordsAndAByte = moved.get::<TwoWordsAndAByte>();

    assert_eq!(before, after);
    assert_eq!(moved.to_string(), "1/2/3");
}

#[test]
#[should_panic(
    expected = "attempted to access error payload of type `error_value::NotFound` as `alloc::string::String`"
)]
fn test_get_with_wrong_type_panics() {
    let error = ErrorValue::new(NotFound(1));
    let _ = error.get::<String>();
}

#[test]
#[should_panic(expected = "attempted to access error payload of type")]
fn test_get_mut_with_wrong_type_panics() {
    let mut error = ErrorValue::new(ParseError::UnexpectedEof(4));
    let _ = error.get_mut::<NotFound>();
}

#[test]
fn test_string_construction() {
    let error = error!("mojo ", 42);
    assert_eq!(error.to_string(), "mojo 42");
    assert!(error.is_a::<String>());

    let error = error!("bad");
    assert_eq!(error.to_string(), "bad");
    assert_eq!(format!("{error:?}"), "Error(bad)");

    let error = ErrorValue::from("from str");
    assert_eq!(error.get::<String>(), "from str");
    let error = ErrorValue::from(String::from("from string"));
    assert_eq!(error.to_string(), "from string");
}

#[test]
fn test_bail_and_into_result() {
    fn checked_div(a: u32, b: u32) -> polyerr::Result<u32> {
        if b == 0 {
            bail!("division of ", a, " by zero");
        }
        Ok(a / b)
    }

    assert_eq!(checked_div(8, 2).unwrap(), 4);
    let error = checked_div(8, 0).unwrap_err();
    assert_eq!(error.to_string(), "division of 8 by zero");

    assert!(ErrorValue::empty().into_result().is_ok());
    assert!(error.into_result().is_err());
}

#[test]
fn test_usable_as_std_error() {
    fn fails() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(ErrorValue::new(NotFound(9)))?;
        Ok(())
    }

    let error = fails().unwrap_err();
    assert_eq!(error.to_string(), "not found: 9");
    assert!(error.downcast_ref::<ErrorValue>().is_some());
}

#[test]
fn test_send_across_threads() {
    let error = ErrorValue::new(PermissionDenied {
        user: "bob".to_string(),
    });
    let copy = error.clone();

    let handle = std::thread::spawn(move || copy.to_string());
    assert_eq!(handle.join().unwrap(), "permission denied for bob");
    assert_eq!(error.to_string(), "permission denied for bob");
}

#[test]
fn test_copies_share_the_stack_trace() {
    let error = ErrorValue::new(NotFound(1));
    let copy = error.clone();
    assert!(copy.stack_trace().ptr_eq(&error.stack_trace()));
}

#[test]
fn test_inline_payload_with_atomic_field() {
    use std::sync::atomic::AtomicU32;

    #[derive(Debug)]
    struct Flagged(AtomicU32);

    impl Clone for Flagged {
        fn clone(&self) -> Self {
            Self(AtomicU32::new(self.0.load(Ordering::Relaxed)))
        }
    }

    impl fmt::Display for Flagged {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "flag {}", self.0.load(Ordering::Relaxed))
        }
    }

    assert_eq!(StorageMode::of::<Flagged>(), StorageMode::Inline);
    let error = ErrorValue::with_trace_depth(Flagged(AtomicU32::new(0)), -1);
    error.get::<Flagged>().0.store(7, Ordering::Relaxed);
    assert_eq!(error.to_string(), "flag 7");

    let copy = error.clone();
    if let Some(flagged) = error.downcast_ref::<Flagged>() {
        flagged.0.store(9, Ordering::Relaxed);
    }
    assert_eq!(copy.to_string(), "flag 7");
    assert_eq!(error.to_string(), "flag 9");
}
