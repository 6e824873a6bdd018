//! Registry reconciliation and completion.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use command_runner::models::session::SessionInfo;
use command_runner::orchestrator::registry::{self, MAX_CHOICES};
use command_runner::tmux::LiveSession;

fn live(name: &str, secs: i64) -> LiveSession {
    LiveSession {
        name: name.into(),
        created_at: Utc.timestamp_opt(secs, 0).single().expect("ts"),
    }
}

#[test]
fn reconcile_drops_foreign_sessions_and_sorts_oldest_first() {
    let now = Utc.timestamp_opt(2_000, 0).single().expect("ts");
    let sessions = registry::reconcile(
        vec![
            live("beta-20261017-153012-500", 1_500),
            live("main", 100),
            live("alpha-20261017-153012-427", 1_000),
            live("alpha-20261017-153012-428", 1_000),
        ],
        now,
    );

    let names: Vec<_> = sessions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "alpha-20261017-153012-427",
            "alpha-20261017-153012-428",
            "beta-20261017-153012-500"
        ]
    );
    assert_eq!(sessions[0].project, "alpha");
    assert_eq!(sessions[0].age, Duration::from_secs(1_000));
    assert_eq!(sessions[2].age, Duration::from_secs(500));
}

#[test]
fn age_is_zero_for_sessions_from_the_future() {
    let now = Utc.timestamp_opt(10, 0).single().expect("ts");
    let sessions = registry::reconcile(vec![live("alpha-20261017-153012-427", 20)], now);
    assert_eq!(sessions[0].age, Duration::ZERO);
}

#[test]
fn age_display_picks_the_largest_units() {
    let mut info = SessionInfo {
        name: "alpha-20261017-153012-427".into(),
        project: "alpha".into(),
        created_at: Utc::now(),
        age: Duration::from_secs(45),
    };
    assert_eq!(info.age_display(), "45s");
    info.age = Duration::from_secs(125);
    assert_eq!(info.age_display(), "2m 5s");
    info.age = Duration::from_secs(3 * 3600 + 12 * 60 + 9);
    assert_eq!(info.age_display(), "3h 12m");
}

#[test]
fn complete_filters_case_insensitively_and_caps_choices() {
    let now = Utc.timestamp_opt(10_000, 0).single().expect("ts");
    let live_list: Vec<_> = (0..40)
        .map(|i| live(&format!("alpha-20261017-153012-{i:03}"), i))
        .chain([live("beta-20261017-153012-999", 50)])
        .collect();
    let sessions = registry::reconcile(live_list, now);

    assert_eq!(registry::complete(&sessions, "ALPHA").len(), MAX_CHOICES);
    assert_eq!(
        registry::complete(&sessions, "Beta"),
        vec!["beta-20261017-153012-999".to_owned()]
    );
    assert!(registry::complete(&sessions, "gamma").is_empty());
}

#[test]
fn complete_projects_lists_visible_directories() {
    let root = tempfile::tempdir().expect("tempdir");
    for dir in ["webapp", "WebTools", "api", ".git"] {
        std::fs::create_dir(root.path().join(dir)).expect("mkdir");
    }
    std::fs::write(root.path().join("web.txt"), "not a dir").expect("write");

    assert_eq!(
        registry::complete_projects(root.path(), "web"),
        vec!["WebTools".to_owned(), "webapp".to_owned()]
    );
    assert_eq!(registry::complete_projects(root.path(), "").len(), 3);
    assert!(registry::complete_projects(&root.path().join("missing"), "").is_empty());
}

#[test]
fn complete_projects_caps_choices() {
    let root = tempfile::tempdir().expect("tempdir");
    for i in 0..30 {
        std::fs::create_dir(root.path().join(format!("p{i:02}"))).expect("mkdir");
    }
    let choices = registry::complete_projects(root.path(), "p");
    assert_eq!(choices.len(), MAX_CHOICES);
    assert_eq!(choices[0], "p00");
}
