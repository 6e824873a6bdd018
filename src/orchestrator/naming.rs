//! Session naming: allocation and parsing of `<project-slug>-<disambiguator>`.
//!
//! Names are the only synchronization primitive between concurrent spawns.
//! The disambiguator is a hybrid logical clock in milliseconds kept in a
//! process-wide atomic: every allocation takes `max(wall_ms, last + 1)`, so
//! two allocations in one process can never share a value, and values keep
//! tracking wall time across restarts. It is rendered in UTC as
//! `YYYYMMDD-HHMMSS-mmm`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::{AppError, Result};

/// Longest project slug kept in a name.
pub const MAX_SLUG_LEN: usize = 40;

/// Slug used when a project name has no usable characters.
pub const FALLBACK_SLUG: &str = "session";

const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[allow(clippy::expect_used)]
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9][a-z0-9_-]*)-(\d{8}-\d{6})-(\d{3})$").expect("static name pattern")
});

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// A validated session name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionName(String);

impl SessionName {
    /// Borrow the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the name into its parts.
    #[must_use]
    pub fn parts(&self) -> ParsedName {
        // Every `SessionName` was either allocated or passed `parse`.
        match parse(&self.0) {
            Ok(parsed) => parsed,
            Err(_) => ParsedName {
                project: FALLBACK_SLUG.into(),
                disambiguator: String::new(),
                issued_at: DateTime::<Utc>::UNIX_EPOCH,
            },
        }
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The parts of a session name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Project slug.
    pub project: String,
    /// Uniqueness suffix, `YYYYMMDD-HHMMSS-mmm`.
    pub disambiguator: String,
    /// Clock reading the disambiguator encodes.
    pub issued_at: DateTime<Utc>,
}

/// Reduce an arbitrary project name to the slug alphabet.
///
/// Keeps lowercase ASCII alphanumerics, `_` and `-`; every other run of
/// characters becomes one `-`. The result is safe as a tmux session name,
/// a path component and a completion token.
#[must_use]
pub fn slugify(project: &str) -> String {
    let mut slug = String::with_capacity(project.len());
    for ch in project.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || ch == '_' {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let mut slug: String = slug.trim_matches(|c| c == '-' || c == '_').to_owned();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches(['-', '_']).to_owned();
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_owned()
    } else {
        slug
    }
}

/// Allocate a fresh name for `project`.
///
/// Safe to call from any number of tasks at once.
#[must_use]
pub fn allocate(project: &str) -> SessionName {
    let millis = next_tick(Utc::now().timestamp_millis());
    SessionName(format!("{}-{}", slugify(project), render_stamp(millis)))
}

/// Split `name` into its parts.
///
/// Pure; used by the registry and by completion.
///
/// # Errors
///
/// Returns `AppError::InvalidName` for anything outside the naming scheme,
/// such as unrelated tmux sessions.
pub fn parse(name: &str) -> Result<ParsedName> {
    let caps = NAME_PATTERN
        .captures(name)
        .ok_or_else(|| AppError::InvalidName(name.to_owned()))?;

    let project = caps[1].to_owned();
    if project.len() > MAX_SLUG_LEN || project.ends_with('-') {
        return Err(AppError::InvalidName(name.to_owned()));
    }

    let stamp = &caps[2];
    let millis: i64 = caps[3]
        .parse()
        .map_err(|_| AppError::InvalidName(name.to_owned()))?;
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .map_err(|_| AppError::InvalidName(name.to_owned()))?;
    let issued_at = Utc.from_utc_datetime(&naive) + chrono::Duration::milliseconds(millis);

    Ok(ParsedName {
        project,
        disambiguator: format!("{stamp}-{}", &caps[3]),
        issued_at,
    })
}

/// Validate an externally supplied name.
///
/// # Errors
///
/// Returns `AppError::InvalidName` if `name` does not parse.
pub fn validate(name: &str) -> Result<SessionName> {
    parse(name).map(|_| SessionName(name.to_owned()))
}

/// Advance the process clock to at least `wall_ms`, strictly past the last
/// value handed out.
fn next_tick(wall_ms: i64) -> u64 {
    let wall = u64::try_from(wall_ms).unwrap_or(0);
    let mut last = CLOCK.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last + 1);
        match CLOCK.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

fn render_stamp(millis: u64) -> String {
    let ms = i64::try_from(millis).unwrap_or(i64::MAX);
    let at = Utc
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    format!("{}-{:03}", at.format(STAMP_FORMAT), millis % 1000)
}
