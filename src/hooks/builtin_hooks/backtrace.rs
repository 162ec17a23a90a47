//! Stack trace collector backed by the [`backtrace`] crate.
//!
//! This module is only available when the `backtrace` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! polyerr = { version = "0.1", features = ["backtrace"] }
//! ```
//!
//! # Environment Variables
//!
//! - `POLYERR_BACKTRACE` - Comma-separated options. Collection is off unless
//!   one of them opts in:
//!   - `1`, `true` or `on` - Collect stack traces
//!   - `full_paths` - Collect stack traces and show full file paths
//! - `RUST_BACKTRACE=full` - Disables frame filtering and shows full paths
//!
//! # Output
//!
//! Every kept frame is rendered on its own line as `function - path:line`.
//! Frames from std and cargo registry crates have their paths shortened to
//! `[..]/crate-version/src/...` unless full paths are requested.

use alloc::{borrow::Cow, format, string::String, vec::Vec};
use core::fmt::Write as _;
use std::sync::OnceLock;

use backtrace::BytesOrWideString;

use crate::hooks::TraceCollector;

/// Trace collector that walks the current stack with [`backtrace::trace`].
///
/// # Examples
///
/// ```rust
/// use polyerr::hooks::{
///     Hooks,
///     builtin_hooks::backtrace::{BacktraceCollector, BacktraceFilter},
/// };
///
/// // Always collect, regardless of the environment
/// Hooks::new()
///     .trace_collector(BacktraceCollector::enabled(BacktraceFilter::DEFAULT))
///     .install()
///     .expect("failed to install hooks");
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BacktraceCollector {
    /// Whether stack traces are collected at all.
    pub enabled: bool,
    /// Configuration for filtering and formatting frames.
    pub filter: BacktraceFilter,
}

/// Configuration for filtering frames from certain crates in a stack trace.
#[derive(Copy, Clone, Debug)]
pub struct BacktraceFilter {
    /// Crate names whose frames are hidden when they appear at the beginning
    /// of a trace, before the first frame of interest.
    pub skipped_initial_crates: &'static [&'static str],
    /// Crate names whose frames are hidden when they appear at the end of a
    /// trace.
    pub skipped_final_crates: &'static [&'static str],
    /// Maximum number of frames to render when the caller does not ask for
    /// fewer.
    pub max_frame_count: usize,
    /// Whether to show full file paths.
    pub show_full_path: bool,
}

impl BacktraceFilter {
    /// Default filter settings.
    pub const DEFAULT: Self = Self {
        skipped_initial_crates: &[
            "backtrace",
            "polyerr",
            "polyerr-internals",
            "core",
            "std",
            "alloc",
        ],
        skipped_final_crates: &["std", "core", "alloc"],
        max_frame_count: 20,
        show_full_path: false,
    };

    /// Filter settings that keep every frame.
    pub const UNFILTERED: Self = Self {
        skipped_initial_crates: &[],
        skipped_final_crates: &[],
        max_frame_count: usize::MAX,
        show_full_path: true,
    };
}

impl Default for BacktraceFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
struct PolyerrEnvOptions {
    enabled: bool,
    rust_backtrace_full: bool,
    show_full_path: bool,
}

impl PolyerrEnvOptions {
    fn get() -> &'static Self {
        static POLYERR_FLAGS: OnceLock<PolyerrEnvOptions> = OnceLock::new();

        POLYERR_FLAGS.get_or_init(|| {
            let rust_backtrace_full =
                std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full");
            let mut options = PolyerrEnvOptions {
                enabled: false,
                rust_backtrace_full,
                show_full_path: rust_backtrace_full,
            };
            if let Some(var) = std::env::var_os("POLYERR_BACKTRACE") {
                options.apply(&var.to_string_lossy());
            }
            options
        })
    }

    fn apply(&mut self, var: &str) {
        for option in var.split(',').map(str::trim) {
            if ["1", "true", "on"]
                .iter()
                .any(|value| option.eq_ignore_ascii_case(value))
            {
                self.enabled = true;
            } else if option.eq_ignore_ascii_case("full_paths") {
                self.enabled = true;
                self.show_full_path = true;
            }
        }
    }
}

impl BacktraceCollector {
    /// Creates a collector configured from the environment.
    ///
    /// Collection is disabled unless `POLYERR_BACKTRACE` opts in. The
    /// environment is only read once per process.
    pub fn new_from_env() -> Self {
        let env_options = PolyerrEnvOptions::get();
        let filter = if env_options.rust_backtrace_full {
            BacktraceFilter::UNFILTERED
        } else {
            BacktraceFilter {
                show_full_path: env_options.show_full_path,
                ..BacktraceFilter::DEFAULT
            }
        };

        Self {
            enabled: env_options.enabled,
            filter,
        }
    }

    /// Creates a collector that always collects, using `filter`.
    pub const fn enabled(filter: BacktraceFilter) -> Self {
        Self {
            enabled: true,
            filter,
        }
    }

    /// Walks the stack and returns the frames that survive filtering, along
    /// with the number of frames that were dropped.
    fn collect_frames(&self, max_frames: usize) -> (Vec<CollectedFrame>, usize) {
        let limit = match max_frames {
            0 => self.filter.max_frame_count,
            n => n.min(self.filter.max_frame_count),
        };
        let mut frames: Vec<CollectedFrame> = Vec::new();
        let mut omitted = 0usize;
        let mut skipping_initial = !self.filter.skipped_initial_crates.is_empty();

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                let (Some(name), Some(filename)) = (symbol.name(), symbol.filename_raw()) else {
                    return;
                };

                let path = FramePath::new(filename);
                if skipping_initial {
                    if path
                        .crate_name
                        .as_deref()
                        .is_some_and(|name| self.filter.skipped_initial_crates.contains(&name))
                    {
                        omitted += 1;
                        return;
                    }
                    skipping_initial = false;
                }

                if frames.len() >= limit {
                    omitted += 1;
                    return;
                }

                frames.push(CollectedFrame {
                    symbol: format!("{name:#}"),
                    path,
                    lineno: symbol.lineno(),
                });
            });
            true
        });

        while frames.last().is_some_and(|frame| {
            frame
                .path
                .crate_name
                .as_deref()
                .is_some_and(|name| self.filter.skipped_final_crates.contains(&name))
                || frame.symbol.starts_with("__libc_start")
        }) {
            frames.pop();
            omitted += 1;
        }

        (frames, omitted)
    }

    /// Renders collected frames as text.
    fn render(&self, frames: &[CollectedFrame], omitted: usize) -> String {
        const MAX_ALIGNED_NAME_LENGTH: usize = 25;

        let width = frames
            .iter()
            .map(|frame| function_name(&frame.symbol).len())
            .filter(|&len| len <= MAX_ALIGNED_NAME_LENGTH)
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for frame in frames {
            let name = function_name(&frame.symbol);
            if name.len() <= MAX_ALIGNED_NAME_LENGTH {
                let _ = write!(out, "{name:<width$} - ");
            } else {
                let _ = write!(out, "{name}\n   - ");
            }

            match (&frame.path.short_path, self.filter.show_full_path) {
                (Some(short), false) => {
                    let _ = write!(out, "[..]/{short}");
                }
                _ => out.push_str(&frame.path.raw_path),
            }
            if let Some(lineno) = frame.lineno {
                let _ = write!(out, ":{lineno}");
            }
            out.push('\n');
        }

        if omitted > 0 {
            let _ = writeln!(
                out,
                "note: {omitted} frame(s) omitted. For a complete stack trace, set RUST_BACKTRACE=full."
            );
        }
        out
    }
}

impl Default for BacktraceCollector {
    fn default() -> Self {
        Self::new_from_env()
    }
}

impl TraceCollector for BacktraceCollector {
    fn capture(&self, max_frames: usize) -> Vec<u8> {
        if !self.enabled {
            return Vec::new();
        }
        let (frames, omitted) = self.collect_frames(max_frames);
        if frames.is_empty() {
            return Vec::new();
        }
        self.render(&frames, omitted).into_bytes()
    }
}

/// A resolved frame that survived filtering.
struct CollectedFrame {
    symbol: String,
    path: FramePath,
    lineno: Option<u32>,
}

/// The file path of a frame, with the crate it belongs to when known.
struct FramePath {
    raw_path: String,
    crate_name: Option<Cow<'static, str>>,
    /// The path relative to a known prefix (the std sources, the cargo
    /// registry or this crate).
    short_path: Option<String>,
}

/// Directory holding this crate's sources.
const POLYERR_SOURCE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src");

/// Length of the parent of `dir`, without the trailing separator.
const fn parent_dir_len(dir: &str) -> usize {
    let bytes = dir.as_bytes();
    let mut len = bytes.len();
    while len > 0 {
        len -= 1;
        if bytes[len] == b'/' || bytes[len] == b'\\' {
            return len;
        }
    }
    0
}

/// Source prefix that identifies frames of this crate, and the length of the
/// part stripped from their paths when shortening.
const POLYERR_MATCHER: (&str, usize) = (
    POLYERR_SOURCE_DIR,
    parent_dir_len(env!("CARGO_MANIFEST_DIR")),
);

impl FramePath {
    fn new(path: BytesOrWideString<'_>) -> Self {
        static REGEXES: OnceLock<Option<[regex::Regex; 2]>> = OnceLock::new();
        let regexes = REGEXES.get_or_init(|| {
            Some([
                // - /lib/rustlib/src/rust/library/{std|core|alloc}/src/...
                // - /rustc/{40-char-hash}/library/{std|core|alloc}/src/...
                regex::Regex::new(
                    r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/(std|core|alloc)/src/.*$",
                )
                .ok()?,
                // - {CARGO_HOME}/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
                regex::Regex::new(
                    r"/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
                )
                .ok()?,
            ])
        });

        let raw_path = path.to_str_lossy().into_owned();

        if let Some(regexes) = regexes {
            for regex in regexes {
                if let Some(crate_capture) = regex.captures(&raw_path).and_then(|c| c.get(1)) {
                    return Self {
                        crate_name: Some(Cow::Owned(crate_capture.as_str().into())),
                        short_path: Some(raw_path[crate_capture.start()..].into()),
                        raw_path,
                    };
                }
            }
        }

        let (matcher_prefix, parent_len) = POLYERR_MATCHER;
        if raw_path.starts_with(matcher_prefix) {
            return Self {
                crate_name: Some(Cow::Borrowed("polyerr")),
                short_path: raw_path.get(parent_len + 1..).map(Into::into),
                raw_path,
            };
        }

        Self {
            raw_path,
            crate_name: None,
            short_path: None,
        }
    }
}

/// Extracts the bare function name from a demangled symbol, skipping module
/// paths and generic arguments.
///
/// For `<alloc::vec::Vec<T> as core::ops::Drop>::drop` this is `drop`, and
/// for `app::main::{{closure}}` it is `{{closure}}`.
fn function_name(symbol: &str) -> &str {
    let mut start = 0usize;
    let mut end = 0usize;
    let mut angle_depth = 0u32;
    let mut curly_depth = 0u32;
    let mut after_dash = false;
    let mut in_word = false;

    for (i, c) in symbol.char_indices() {
        if curly_depth == 0 && angle_depth == 0 {
            if !in_word && unicode_ident::is_xid_start(c) {
                start = i;
                in_word = true;
            } else if in_word && !unicode_ident::is_xid_continue(c) {
                end = i;
                in_word = false;
            }
        }

        let arrow = after_dash && c == '>';
        after_dash = c == '-';

        match c {
            '<' => angle_depth = angle_depth.saturating_add(1),
            '>' if !arrow => angle_depth = angle_depth.saturating_sub(1),
            '{' => {
                curly_depth = curly_depth.saturating_add(1);
                if !in_word && curly_depth == 1 && angle_depth == 0 {
                    start = i;
                    in_word = true;
                }
            }
            '}' => {
                curly_depth = curly_depth.saturating_sub(1);
                if in_word && curly_depth == 0 {
                    end = i + 1;
                    in_word = false;
                }
            }
            _ => {}
        }
    }

    if start < end {
        &symbol[start..end]
    } else {
        &symbol[start..]
    }
}
