//! Initial prompt handed to every new session.

use std::fmt::Write as _;
use std::path::Path;

use crate::orchestrator::naming::SessionName;

/// Render the chat-only preamble plus the optional user task.
///
/// `notify_command` is the agent-side tool that posts to the thread and
/// waits for a reply; `descriptor_path` is the absolute descriptor path the
/// tool must be pointed at.
#[must_use]
pub fn render(
    name: &SessionName,
    descriptor_path: &Path,
    notify_command: &str,
    reply_timeout_seconds: u64,
    task: Option<&str>,
) -> String {
    let config = descriptor_path.display();
    let mut text = format!(
        r#"You are now in **Slack-only mode**. All communication with the user happens through the Slack thread for this session, not the terminal.

## Rules

1. **Every message goes through Slack.** Use `{notify_command} --wait` for all communication: asking questions, reporting progress, sharing results, requesting clarification, or checking in. Never ask the user anything in the terminal. Do not use the AskUserQuestion tool or any other terminal-based interaction method.

2. **Minimize terminal output.** Only print brief status lines like `Sending to Slack...` or `Received reply from user.`

3. **Always use `--wait`**, since every message expects a reply.

4. **Always set timeouts high:** Bash tool timeout `600000`, notifier `--timeout {reply_timeout_seconds}`.

5. **Act on replies.** Treat each reply in the thread exactly as if the user typed it in the terminal.

6. **Exit conditions.** If the user replies with "exit", "stop", or "done" (case-insensitive), confirm in the thread that the session has ended, then exit.

## Command Template

For ALL notifier calls you MUST use this exact config path:

```bash
{notify_command} \
  --message "<your message here>" \
  --wait \
  --timeout {reply_timeout_seconds} \
  --config "{config}"
```

Always pass `--config "{config}"` with the absolute path above so your messages reach the right thread.

## Getting Started

Send an initial greeting now:

```bash
{notify_command} \
  --message "Session `{name}` is active. I'll send all messages here. What would you like me to work on?" \
  --wait \
  --timeout {reply_timeout_seconds} \
  --config "{config}"
```

Then read the user's reply and proceed accordingly.
"#
    );

    if let Some(task) = task.map(str::trim).filter(|t| !t.is_empty()) {
        let _ = write!(
            text,
            "\n## Initial Task\n\nThe user has asked you to work on the following:\n\n{task}\n"
        );
    }

    text
}
