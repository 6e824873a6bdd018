//! `AppError` display format.

use command_runner::AppError;

#[test]
fn spawn_failures_have_distinct_prefixes() {
    let cases = [
        (AppError::Thread("x".into()), "could not create thread: x"),
        (AppError::Descriptor("x".into()), "could not write config: x"),
        (AppError::DescriptorRead("x".into()), "could not read config: x"),
        (AppError::Launch("x".into()), "could not launch session: x"),
        (AppError::Delivery("x".into()), "could not deliver prompt: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn error_messages_have_no_trailing_period() {
    let err = AppError::NotFound("session alpha".into());
    let s = err.to_string();
    assert!(!s.ends_with('.'), "error message must not end with a period: {s}");
}

#[test]
fn io_errors_convert() {
    let err: AppError = std::io::Error::other("disk full").into();
    assert!(matches!(err, AppError::Io(_)));
    assert_eq!(err.to_string(), "io: disk full");
}

#[test]
fn toml_errors_become_config_errors() {
    let err: AppError = toml::from_str::<toml::Value>("= nope")
        .expect_err("invalid toml")
        .into();
    assert!(err.to_string().starts_with("config: invalid config"));
}
