//! Slash command argument parsing and reply rendering.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use command_runner::models::session::SessionInfo;
use command_runner::orchestrator::spawner::{self, SpawnRequest};
use command_runner::slack::commands::{parse_spawn_args, render_sessions};

fn projects() -> tempfile::TempDir {
    let root = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(root.path().join("alpha")).expect("mkdir");
    root
}

#[test]
fn first_word_naming_a_project_directory_is_the_project() {
    let root = projects();
    let request = parse_spawn_args("alpha fix the login bug", root.path());
    assert_eq!(
        request,
        SpawnRequest {
            project: Some("alpha".into()),
            prompt: Some("fix the login bug".into()),
            working_dir: None,
        }
    );
}

#[test]
fn other_first_words_belong_to_the_prompt() {
    let root = projects();
    let request = parse_spawn_args("fix the login bug", root.path());
    assert_eq!(request.project, None);
    assert_eq!(request.prompt.as_deref(), Some("fix the login bug"));
}

#[test]
fn dir_prefix_sets_the_working_directory() {
    let root = projects();
    let request = parse_spawn_args("dir:/srv/app alpha deploy it", root.path());
    assert_eq!(request.working_dir, Some(PathBuf::from("/srv/app")));
    assert_eq!(request.project, None);
    assert_eq!(request.prompt.as_deref(), Some("alpha deploy it"));
}

#[test]
fn empty_arguments_give_an_empty_request() {
    let root = projects();
    assert_eq!(parse_spawn_args("   ", root.path()), SpawnRequest::default());
    assert_eq!(
        parse_spawn_args("alpha", root.path()).project.as_deref(),
        Some("alpha")
    );
}

#[test]
fn relative_paths_are_not_projects() {
    let root = projects();
    let request = parse_spawn_args("../alpha go", root.path());
    assert_eq!(request.project, None);
}

#[test]
fn thread_title_uses_the_prompt_head() {
    assert_eq!(spawner::thread_title(None), "Claude Session");
    assert_eq!(spawner::thread_title(Some("   ")), "Claude Session");
    assert_eq!(spawner::thread_title(Some("fix it")), "Claude: fix it");
    let long = "y".repeat(200);
    assert_eq!(
        spawner::thread_title(Some(&long)).len(),
        "Claude: ".len() + 80
    );
}

#[test]
fn project_label_prefers_the_project_name() {
    let request = SpawnRequest {
        project: Some("/srv/projects/Beta".into()),
        ..SpawnRequest::default()
    };
    assert_eq!(spawner::project_label(&request, Path::new("/tmp")), "Beta");
    assert_eq!(
        spawner::project_label(&SpawnRequest::default(), Path::new("/srv/gamma")),
        "gamma"
    );
}

#[test]
fn empty_session_list_has_a_friendly_reply() {
    assert_eq!(render_sessions(&[]), "No active Claude sessions.");
}

#[test]
fn session_list_shows_name_start_and_age() {
    let sessions = [SessionInfo {
        name: "alpha-20261017-153012-427".into(),
        project: "alpha".into(),
        created_at: Utc.with_ymd_and_hms(2026, 10, 17, 15, 30, 12).single().expect("ts"),
        age: Duration::from_secs(125),
    }];
    let reply = render_sessions(&sessions);
    assert!(reply.contains("`alpha-20261017-153012-427`"));
    assert!(reply.contains("2026-10-17 15:30:12 UTC"));
    assert!(reply.contains("(2m 5s)"));
}
