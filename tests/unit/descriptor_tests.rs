//! Descriptor rendering and line-scanner parsing.

use std::path::PathBuf;

use command_runner::config::SignalConfig;
use command_runner::models::descriptor::{RoutingTarget, SessionDescriptor};
use command_runner::AppError;

fn sample() -> SessionDescriptor {
    SessionDescriptor {
        target: RoutingTarget::thread("C123", "1792250000.000100"),
        bot_token: "xoxb-abc".into(),
        working_dir: PathBuf::from("/home/dev/projects/alpha"),
        default_timeout: 86_400,
        signal: SignalConfig {
            throttle_seconds: 10,
            ..SignalConfig::default()
        },
    }
}

#[test]
fn rendered_descriptor_is_fenced_key_value_lines() {
    let raw = sample().render();
    assert!(raw.starts_with("---\n"));
    assert!(raw.ends_with("---\n"));
    assert!(raw.contains("channel_id: C123\n"));
    assert!(raw.contains("thread_ts: 1792250000.000100\n"));
    assert!(raw.contains("bot_token: xoxb-abc\n"));
    assert!(raw.contains("throttle_seconds: 10\n"));
}

#[test]
fn rendered_descriptor_parses_back() {
    let descriptor = sample();
    let parsed = SessionDescriptor::parse(&descriptor.render()).expect("parse");
    assert_eq!(parsed, descriptor);
}

#[test]
fn parse_ignores_unknown_keys_and_text_after_the_block() {
    let raw = "---\nchannel_id: C1\nbot_token: xoxb-1\nfavourite_colour: blue\n---\n\
               channel_id: C2\n";
    let parsed = SessionDescriptor::parse(raw).expect("parse");
    assert_eq!(parsed.target.channel_id, "C1");
    assert_eq!(parsed.target.thread_ts, None);
}

#[test]
fn parse_splits_on_the_first_colon_only() {
    let raw = "---\nchannel_id: C1\nbot_token: xoxb:with:colons\n---\n";
    let parsed = SessionDescriptor::parse(raw).expect("parse");
    assert_eq!(parsed.bot_token, "xoxb:with:colons");
}

#[test]
fn parse_falls_back_on_malformed_numbers() {
    let raw = "---\nchannel_id: C1\nbot_token: t\nthrottle_seconds: soon\n\
               call_timeout_seconds: 0\ndefault_timeout: x\n---\n";
    let parsed = SessionDescriptor::parse(raw).expect("parse");
    assert_eq!(parsed.signal, SignalConfig::default());
    assert_eq!(parsed.default_timeout, 86_400);
}

#[test]
fn parse_requires_channel_and_token() {
    let missing_channel = SessionDescriptor::parse("---\nbot_token: t\n---\n");
    assert!(matches!(missing_channel, Err(AppError::DescriptorRead(_))));

    let empty_token = SessionDescriptor::parse("---\nchannel_id: C1\nbot_token:\n---\n");
    assert!(matches!(empty_token, Err(AppError::DescriptorRead(_))));
    assert!(empty_token
        .expect_err("no token")
        .to_string()
        .starts_with("could not read config"));
}

#[test]
fn parse_accepts_unfenced_files() {
    let parsed = SessionDescriptor::parse("channel_id: C1\nbot_token: t\n").expect("parse");
    assert_eq!(parsed.target.channel_id, "C1");
}
