use crate::platform::Comment;

/// Leading phrase of every triage report, after the author mention. Prior
/// reports are recognized by it.
pub const REPORT_SIGNATURE: &str = "your pull request needs to be fixed";

const CALL_TO_ACTION: &str = "Please fix the failing tests shown above and push your changes.";

/// Errors extracted from one failed job of one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJobRecord {
    pub workflow: String,
    pub job: String,
    pub errors: Vec<String>,
}

/// Render the Markdown report comment addressed to `author`.
pub fn render_report(author: &str, records: &[FailedJobRecord]) -> String {
    let mut lines: Vec<String> = vec![format!("@{author} {REPORT_SIGNATURE}."), String::new()];

    for record in records {
        lines.push(format!("### {} - {}", record.workflow, record.job));
        lines.push(String::new());
        lines.push("```bash".to_string());
        lines.extend(record.errors.iter().cloned());
        lines.push("```".to_string());
        lines.push(String::new());
    }

    lines.push(CALL_TO_ACTION.to_string());
    lines.join("\n")
}

/// Whether `body` is a triage report: its first line is an `@mention`
/// followed by the report signature.
pub fn is_report_body(body: &str) -> bool {
    let first = body.lines().next().unwrap_or_default();
    first
        .split_once(' ')
        .is_some_and(|(mention, rest)| mention.starts_with('@') && rest.starts_with(REPORT_SIGNATURE))
}

/// Comments that are earlier reports posted by `bot_login`.
pub fn prior_reports<'a>(comments: &'a [Comment], bot_login: &str) -> Vec<&'a Comment> {
    comments
        .iter()
        .filter(|c| c.author_login == bot_login && is_report_body(&c.body))
        .collect()
}
