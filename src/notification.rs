//! Best-effort desktop notifications for command outcomes.

/// Fire-and-forget notification shown after a copy or save command. A
/// missing notification daemon must not break the viewer, so failures are
/// logged and swallowed.
pub fn send(summary: &str, body: impl Into<String>) {
    let body = body.into();
    if let Err(err) = notify_rust::Notification::new()
        .appname("markview")
        .summary(summary)
        .body(&body)
        .show()
    {
        tracing::warn!(summary, "system notification failed: {err}");
    }
}
