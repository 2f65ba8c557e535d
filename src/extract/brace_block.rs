use tracing::debug;

use crate::patterns;

use super::normalized_lines;

/// A payload being collected until its braces balance.
struct Capture {
    lines: Vec<String>,
    depth: i64,
}

impl Capture {
    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

/// Extract Ansible `fatal: [host]: FAILED! => {...}` payloads.
///
/// The trigger line opens a capture at depth 1 for its own `{`. Each line
/// after it is appended and moves the depth by its brace counts; the capture
/// is emitted once the depth reaches zero. Partial captures are emitted, never
/// dropped.
pub fn extract(log: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let mut capture: Option<Capture> = None;

    for line in normalized_lines(log) {
        if let Some((pattern, offset)) = patterns::block_trigger(&line) {
            // Emit the cut-off payload instead of discarding it.
            if let Some(partial) = capture.take() {
                debug!(depth = partial.depth, "new trigger before payload closed");
                errors.push(partial.finish());
            }
            debug!(pattern = pattern.description, "payload capture opened");
            let depth = 1 + brace_delta(&line[offset..]);
            let opened = Capture {
                lines: vec![line],
                depth,
            };
            if opened.depth <= 0 {
                errors.push(opened.finish());
            } else {
                capture = Some(opened);
            }
            continue;
        }

        let Some(open) = capture.as_mut() else {
            continue;
        };
        open.depth += brace_delta(&line);
        open.lines.push(line);
        if open.depth <= 0
            && let Some(done) = capture.take()
        {
            errors.push(done.finish());
        }
    }

    if let Some(partial) = capture {
        debug!(depth = partial.depth, "log ended inside payload");
        errors.push(partial.finish());
    }
    errors
}

fn brace_delta(s: &str) -> i64 {
    s.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = "fatal: [h]: FAILED! => {\n  \"a\": {\n    \"b\": 1\n  }\n}";

    #[test]
    fn test_nested_payload_is_one_excerpt() {
        let errors = extract(NESTED);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].lines().count(), 5);
        assert_eq!(
            errors[0],
            "fatal: [h]: FAILED! => {\n\"a\": {\n\"b\": 1\n}\n}"
        );
    }

    #[test]
    fn test_unbalanced_payload_is_flushed_at_end() {
        let truncated = NESTED.strip_suffix("\n}").unwrap();
        let errors = extract(truncated);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].lines().count(), 4);
    }

    #[test]
    fn test_single_line_payload_closes_immediately() {
        let log = "\
TASK [setup] ***
fatal: [localhost]: FAILED! => {\"changed\": false, \"msg\": \"boom\"}
PLAY RECAP ***
localhost : ok=1 failed=1";
        let errors = extract(log);
        assert_eq!(
            errors,
            vec!["fatal: [localhost]: FAILED! => {\"changed\": false, \"msg\": \"boom\"}"]
        );
    }

    #[test]
    fn test_lines_outside_payload_are_ignored() {
        let log = "\
ERROR: something unrelated
fatal: [web]: FAILED! => {
    \"msg\": \"x\"
}
ok: [web]
fatal: [db]: FAILED! => {
    \"rc\": 2
}";
        let errors = extract(log);
        assert_eq!(
            errors,
            vec![
                "fatal: [web]: FAILED! => {\n\"msg\": \"x\"\n}",
                "fatal: [db]: FAILED! => {\n\"rc\": 2\n}",
            ]
        );
    }

    #[test]
    fn test_new_trigger_flushes_open_payload() {
        let log = "\
fatal: [a]: FAILED! => {
    \"msg\": \"cut off\"
fatal: [b]: FAILED! => {}";
        let errors = extract(log);
        assert_eq!(
            errors,
            vec![
                "fatal: [a]: FAILED! => {\n\"msg\": \"cut off\"",
                "fatal: [b]: FAILED! => {}",
            ]
        );
    }

    #[test]
    fn test_trigger_is_normalized_before_matching() {
        let log = "2024-05-01T10:00:00.5Z \x1b[0;31mfatal: [h]: FAILED! => {\x1b[0m\n2024-05-01T10:00:00.6Z }";
        assert_eq!(extract(log), vec!["fatal: [h]: FAILED! => {\n}"]);
    }

    #[test]
    fn test_trigger_is_case_sensitive() {
        let log = "FATAL: [h]: failed! => {\n  \"msg\": \"x\"\n}";
        assert!(extract(log).is_empty());
    }

    #[test]
    fn test_no_trigger_no_excerpts() {
        assert!(extract("ok: [h]\nchanged: [h]\n{ not a payload }").is_empty());
    }

    #[test]
    fn test_brace_delta_counts_both_directions() {
        assert_eq!(brace_delta("{{}"), 1);
        assert_eq!(brace_delta("}}"), -2);
        assert_eq!(brace_delta("plain"), 0);
    }
}
