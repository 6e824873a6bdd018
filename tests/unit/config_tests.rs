//! Configuration parsing, validation and access checks.

use command_runner::config::{GlobalConfig, HandoffConfig, SignalConfig};
use command_runner::AppError;
use serial_test::serial;

fn minimal_toml(root: &str) -> String {
    format!(
        r#"
default_working_dir = '{root}'

[slack]
channel_id = "C123"
"#
    )
}

#[test]
fn minimal_config_gets_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config =
        GlobalConfig::from_toml_str(&minimal_toml(&dir.path().display().to_string()))
            .expect("valid config");

    assert_eq!(config.sessions_dir.to_string_lossy(), "/tmp/claude-sessions");
    assert_eq!(config.tmux_binary, "tmux");
    assert_eq!(config.agent_command, "claude");
    assert_eq!(config.unset_env, vec!["CLAUDECODE".to_owned()]);
    assert_eq!(config.reply_timeout_seconds, 86_400);
    assert!(config.authorized_user_ids.is_empty());
    assert_eq!(config.handoff, HandoffConfig::default());
    assert_eq!(config.signal, SignalConfig::default());
    assert_eq!(config.signal.throttle_seconds, 30);
    assert_eq!(config.handoff.delivery_timeout_seconds, 15);
    assert_eq!(config.handoff.retry_interval_millis, 500);
}

#[test]
fn default_working_dir_is_canonicalized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("a");
    std::fs::create_dir(&nested).expect("mkdir");
    let dotted = format!("{}/a/../a", dir.path().display());

    let config = GlobalConfig::from_toml_str(&minimal_toml(&dotted)).expect("valid config");
    assert_eq!(
        config.default_working_dir(),
        nested.canonicalize().expect("canonical")
    );
}

#[test]
fn missing_working_dir_is_rejected() {
    let result = GlobalConfig::from_toml_str(&minimal_toml("/definitely/not/here"));
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn zero_bounds_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().display().to_string();
    for section in [
        "[handoff]\ndelivery_timeout_seconds = 0",
        "[handoff]\nretry_interval_millis = 0",
        "[signal]\ncall_timeout_seconds = 0",
    ] {
        let toml = format!("{}\n{section}\n", minimal_toml(&root));
        let err = GlobalConfig::from_toml_str(&toml).expect_err("zero bound");
        assert!(err.to_string().contains("greater than zero"), "{err}");
    }
}

#[test]
fn empty_channel_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "default_working_dir = '{}'\n[slack]\nchannel_id = \"\"\n",
        dir.path().display()
    );
    assert!(matches!(
        GlobalConfig::from_toml_str(&toml),
        Err(AppError::Config(_))
    ));
}

#[test]
fn tokens_are_never_read_from_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "default_working_dir = '{}'\n[slack]\nchannel_id = \"C1\"\nbot_token = \"xoxb-leak\"\n",
        dir.path().display()
    );
    let config = GlobalConfig::from_toml_str(&toml).expect("valid config");
    assert!(config.slack.bot_token.is_empty());
}

#[test]
fn launch_command_scrubs_env_and_appends_plugin_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        r#"
default_working_dir = '{}'
agent_args = ["--dangerously-skip-permissions"]
plugin_dir = "/opt/plugins/slack skill"

[slack]
channel_id = "C1"
"#,
        dir.path().display()
    );
    let config = GlobalConfig::from_toml_str(&toml).expect("valid config");
    assert_eq!(
        config.launch_command().expect("quotable"),
        "env -u CLAUDECODE claude --dangerously-skip-permissions --plugin-dir '/opt/plugins/slack skill'"
    );
}

#[test]
fn launch_command_without_scrub_is_just_the_agent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "default_working_dir = '{}'\nunset_env = []\n[slack]\nchannel_id = \"C1\"\n",
        dir.path().display()
    );
    let config = GlobalConfig::from_toml_str(&toml).expect("valid config");
    assert_eq!(config.launch_command().expect("quotable"), "claude");
}

#[test]
fn empty_allow_list_admits_everyone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig::from_toml_str(&minimal_toml(&dir.path().display().to_string()))
        .expect("valid config");
    assert!(config.ensure_authorized("U_ANYONE").is_ok());
}

#[test]
fn allow_list_restricts_users() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "default_working_dir = '{}'\nauthorized_user_ids = [\"U1\"]\n[slack]\nchannel_id = \"C1\"\n",
        dir.path().display()
    );
    let config = GlobalConfig::from_toml_str(&toml).expect("valid config");
    assert!(config.ensure_authorized("U1").is_ok());
    assert!(matches!(
        config.ensure_authorized("U2"),
        Err(AppError::Unauthorized(_))
    ));
}

#[test]
fn commands_only_come_from_the_command_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig::from_toml_str(&minimal_toml(&dir.path().display().to_string()))
        .expect("valid config");
    assert!(config.ensure_command_channel("C123").is_ok());
    assert!(matches!(
        config.ensure_command_channel("C999"),
        Err(AppError::Unauthorized(_))
    ));
}

#[tokio::test]
#[serial]
async fn bot_token_falls_back_to_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config =
        GlobalConfig::from_toml_str(&minimal_toml(&dir.path().display().to_string()))
            .expect("valid config");

    std::env::set_var("SLACK_BOT_TOKEN", "xoxb-from-env");
    let result = config.load_bot_token().await;
    std::env::remove_var("SLACK_BOT_TOKEN");

    result.expect("token loaded");
    assert!(!config.slack.bot_token.is_empty());
}
