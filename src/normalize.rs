//! Per-line sanitizing of raw CI log text.
//!
//! GitHub Actions logs carry a timestamp on every line, terminal color codes,
//! and glyphs that survive decoding as mojibake. None of that is useful in a
//! review comment, so every line goes through [`normalize_line`] before any
//! pattern is tried against it.

use std::sync::LazyLock;

use regex::Regex;

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z\s*)+").unwrap()
});

/// CSI color/erase sequences (also when the ESC byte was mis-decoded) and OSC
/// sequences terminated by BEL or ST.
static ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\x1B|\x{FFFD}|\x{9B})\[[0-9;]*[mK]|\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)")
        .unwrap()
});

static GLYPHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{2713}\x{2714}\x{2716}\x{2717}\x{2718}\x{FE0F}\x{1F300}-\x{1F9FF}]").unwrap()
});

static CONTROLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1F\x7F-\x9F]").unwrap());

/// Byte sequences left behind when UTF-8 output is decoded as Latin-1 or
/// truncated mid-character. Longer entries first.
const ARTIFACTS: &[&str] = &[
    "\u{FEFF}",
    "\u{e2}\u{153}\u{201c}", // ✓
    "\u{e2}\u{153}\u{201d}", // ✔
    "\u{e2}\u{153}\u{2013}", // ✖
    "\u{e2}\u{153}\u{2014}", // ✗
    "\u{e2}\u{153}\u{2dc}",  // ✘
    "\u{e2}\u{FFFD}",
    "\u{f0}\u{FFFD}",
    "\u{FFFD}",
    "\0",
];

/// Clean one raw log line. Returns an empty string when nothing but noise
/// was on the line.
pub fn normalize_line(raw: &str) -> String {
    let mut current = clean_once(raw);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(line: &str) -> String {
    let line = TIMESTAMP.replace(line, "");
    let line = ESCAPES.replace_all(&line, "");
    let mut line = line.into_owned();
    for artifact in ARTIFACTS {
        if line.contains(artifact) {
            line = line.replace(artifact, "");
        }
    }
    let line = GLYPHS.replace_all(&line, "");
    let line = CONTROLS.replace_all(&line, "");
    line.trim().to_string()
}
