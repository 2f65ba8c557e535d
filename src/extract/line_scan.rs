use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::patterns;

use super::normalized_lines;

/// Job-name marker for pytest-style unit test output.
const UNIT_TEST_MARKER: &str = "Units";

/// Prefixes pytest uses for the lines following a failure marker.
const CONTINUATION_PREFIXES: &[&str] = &["E ", "> "];

static UNIT_TEST_FAILURES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)E\s+assert").unwrap(),
        Regex::new(r"(?i)E\s+AssertionError").unwrap(),
        Regex::new(r"(?i)E\s+TypeError").unwrap(),
        Regex::new(r"(?i)E\s+ValueError").unwrap(),
        Regex::new(r"(?i)FAILED\s+tests/unit").unwrap(),
        Regex::new(r"(?i)FAIL:").unwrap(),
    ]
});

/// Extract excerpts from a non-integration job log.
///
/// Unit test jobs are scanned for failure blocks: a failure marker opens a
/// block, `E `/`> ` lines extend it and any other line closes it. Every other
/// job is matched line by line against the pattern catalog.
pub fn extract(log: &str, job_name: &str) -> Vec<String> {
    if job_name.contains(UNIT_TEST_MARKER) {
        unit_test_blocks(log)
    } else {
        catalog_lines(log)
    }
}

fn unit_test_blocks(log: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let mut block: Option<Vec<String>> = None;

    for line in normalized_lines(log) {
        if is_unit_test_failure(&line) {
            // A new marker starts over; the open block is not kept.
            if let Some(dropped) = block.replace(vec![line]) {
                debug!(lines = dropped.len(), "failure marker restarted open block");
            }
            continue;
        }

        let Some(lines) = block.as_mut() else {
            continue;
        };
        if is_continuation(&line) {
            lines.push(line);
        } else {
            errors.push(lines.join("\n"));
            block = None;
        }
    }

    if let Some(lines) = block {
        errors.push(lines.join("\n"));
    }
    errors
}

fn catalog_lines(log: &str) -> Vec<String> {
    normalized_lines(log)
        .filter(|line| match patterns::first_match(line) {
            Some(pattern) => {
                debug!(category = %pattern.category, pattern = pattern.description, "matched");
                true
            }
            None => false,
        })
        .collect()
}

fn is_unit_test_failure(line: &str) -> bool {
    UNIT_TEST_FAILURES.iter().any(|re| re.is_match(line))
}

fn is_continuation(line: &str) -> bool {
    CONTINUATION_PREFIXES.iter().any(|p| line.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_block_stops_at_unrelated_line() {
        let log = "E   assert 1 == 2\nE   some detail\nnext unrelated line";
        let errors = extract(log, "Units (3.12)");
        assert_eq!(errors, vec!["E   assert 1 == 2\nE   some detail"]);
    }

    #[test]
    fn test_unit_block_accepts_source_continuation() {
        let log = "FAILED tests/unit/test_mod.py::test_x\n> check(x)\nE   where x = 0\ndone";
        let errors = extract(log, "Units");
        assert_eq!(
            errors,
            vec!["FAILED tests/unit/test_mod.py::test_x\n> check(x)\nE   where x = 0"]
        );
    }

    #[test]
    fn test_second_marker_replaces_open_block() {
        let log = "FAILED tests/unit/test_mod.py::test_x\n> check(x)\nE   AssertionError\ndone";
        let errors = extract(log, "Units");
        assert_eq!(errors, vec!["E   AssertionError"]);
    }

    #[test]
    fn test_unit_block_flushed_at_end_of_input() {
        let log = "noise\nFAIL: test_something (tests.unit.TestX)\nE   expected 3";
        let errors = extract(log, "Units");
        assert_eq!(errors, vec!["FAIL: test_something (tests.unit.TestX)\nE   expected 3"]);
    }

    #[test]
    fn test_unit_blocks_are_separate() {
        let log = "\
E   TypeError: bad operand
between
E   ValueError: bad value
E   more
tail";
        let errors = extract(log, "Units");
        assert_eq!(
            errors,
            vec![
                "E   TypeError: bad operand",
                "E   ValueError: bad value\nE   more"
            ]
        );
    }

    #[test]
    fn test_unit_jobs_ignore_catalog_lines() {
        let log = "ERROR: collection failed\nTraceback (most recent call last):";
        assert!(extract(log, "Units").is_empty());
    }

    #[test]
    fn test_unit_marker_is_case_sensitive() {
        // "units" in lowercase is not the unit-test dialect; catalog applies.
        let log = "E   assert 1 == 2\nERROR: boom";
        assert_eq!(extract(log, "units"), vec!["ERROR: boom"]);
    }

    #[test]
    fn test_unit_block_strips_timestamps_and_colors() {
        let log = "2024-05-01T10:00:00.123Z \x1b[31mE   assert False\x1b[0m\n2024-05-01T10:00:00.124Z ok";
        assert_eq!(extract(log, "Units"), vec!["E   assert False"]);
    }

    #[test]
    fn test_catalog_scan_emits_whole_normalized_line() {
        let log = "2024-05-01T10:00:00.1Z   \x1b[1mERROR: Found 2 pylint issue(s)\x1b[0m  \nall good";
        let errors = extract(log, "Sanity (devel)");
        assert_eq!(errors, vec!["ERROR: Found 2 pylint issue(s)"]);
    }

    #[test]
    fn test_catalog_scan_emits_each_line_once() {
        // Matches several patterns but yields a single excerpt.
        let log = "TypeError: error: failed: fatal: everything";
        assert_eq!(extract(log, "Sanity"), vec![log]);
    }

    #[test]
    fn test_catalog_scan_keeps_log_order() {
        let log = "\
Traceback (most recent call last):
  File \"plugins/modules/foo.py\", line 12, in <module>
    import bar
ImportError: No module named bar";
        let errors = extract(log, "Sanity");
        assert_eq!(
            errors,
            vec![
                "Traceback (most recent call last):",
                "File \"plugins/modules/foo.py\", line 12, in <module>",
                "ImportError: No module named bar",
            ]
        );
    }

    #[test]
    fn test_catalog_scan_empty_log() {
        assert!(extract("", "Sanity").is_empty());
        assert!(extract("\n\n", "Sanity").is_empty());
    }
}
