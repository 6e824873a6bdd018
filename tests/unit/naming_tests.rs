//! Session name allocation and parsing.

use std::collections::HashSet;
use std::thread;

use command_runner::orchestrator::naming::{self, FALLBACK_SLUG, MAX_SLUG_LEN};
use command_runner::AppError;

#[test]
fn slugify_collapses_foreign_characters() {
    assert_eq!(naming::slugify("My Project!"), "my-project");
    assert_eq!(naming::slugify("api__v2"), "api__v2");
    assert_eq!(naming::slugify("  web / front end  "), "web-front-end");
}

#[test]
fn slugify_falls_back_for_empty_input() {
    assert_eq!(naming::slugify(""), FALLBACK_SLUG);
    assert_eq!(naming::slugify("***"), FALLBACK_SLUG);
}

#[test]
fn slugify_truncates_long_names() {
    let slug = naming::slugify(&"x".repeat(100));
    assert_eq!(slug.len(), MAX_SLUG_LEN);
}

#[test]
fn allocated_name_parses_back_to_its_project() {
    let name = naming::allocate("alpha");
    let parsed = naming::parse(name.as_str()).expect("allocated names parse");
    assert_eq!(parsed.project, "alpha");
    assert_eq!(name.parts(), parsed);
    assert!(name.as_str().ends_with(&parsed.disambiguator));
}

#[test]
fn concurrent_allocations_never_collide() {
    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| (0..250).map(|_| naming::allocate("alpha")).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for name in handle.join().expect("allocator thread") {
            assert!(seen.insert(name.to_string()), "duplicate name {name}");
        }
    }
    assert_eq!(seen.len(), 2000);
}

#[test]
fn parse_rejects_names_outside_the_scheme() {
    for name in [
        "",
        "alpha",
        "main",
        "alpha-20261017-153012",
        "Alpha-20261017-153012-427",
        "-20261017-153012-427",
        "alpha-20261399-153012-427",
        "../etc-20261017-153012-427",
    ] {
        assert!(
            matches!(naming::parse(name), Err(AppError::InvalidName(_))),
            "{name:?} should not parse"
        );
    }
}

#[test]
fn parse_extracts_project_and_timestamp() {
    let parsed = naming::parse("my-app-20261017-153012-427").expect("valid");
    assert_eq!(parsed.project, "my-app");
    assert_eq!(parsed.disambiguator, "20261017-153012-427");
    assert_eq!(parsed.issued_at.timestamp_millis(), 1_792_251_012_427);
}

#[test]
fn validate_accepts_only_parsable_names() {
    assert!(naming::validate("alpha-20261017-153012-427").is_ok());
    assert!(naming::validate("alpha; rm -rf /").is_err());
}
