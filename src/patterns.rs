use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Error-signature family a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Common,
    /// Python tracebacks and exception lines.
    Scripting,
    /// YAML parser/scanner errors.
    StructuredData,
    /// Ansible task failures.
    ConfigMgmt,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Common => write!(f, "common"),
            Category::Scripting => write!(f, "scripting"),
            Category::StructuredData => write!(f, "structured-data"),
            Category::ConfigMgmt => write!(f, "config-mgmt"),
        }
    }
}

#[derive(Debug)]
pub struct ErrorPattern {
    pub pattern: Regex,
    pub description: &'static str,
    pub category: Category,
    /// Opening line of a multi-line payload. Only block patterns carry one.
    pub block_start: Option<Regex>,
}

impl ErrorPattern {
    fn line(category: Category, pattern: &str, description: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            description,
            category,
            block_start: None,
        }
    }

    fn block(
        category: Category,
        pattern: &str,
        start: &str,
        description: &'static str,
    ) -> Self {
        Self {
            block_start: Some(Regex::new(start).unwrap()),
            ..Self::line(category, pattern, description)
        }
    }

    pub fn multiline(&self) -> bool {
        self.block_start.is_some()
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

static CATALOG: LazyLock<Vec<ErrorPattern>> = LazyLock::new(|| {
    use Category::*;
    vec![
        // common
        ErrorPattern::line(Common, r"(?i)error\s*[:!]", "General error detected"),
        ErrorPattern::line(Common, r"(?i)failed\s*[:!]", "Failure detected"),
        ErrorPattern::line(Common, r"(?i)fatal\s*[:!]", "Fatal error detected"),
        // scripting
        ErrorPattern::line(
            Scripting,
            r"Traceback \(most recent call last\):",
            "Python traceback",
        ),
        ErrorPattern::line(
            Scripting,
            r#"^\s*File "(.+)", line (\d+)"#,
            "Python file location",
        ),
        ErrorPattern::line(
            Scripting,
            r"(?i)ImportError: No module named",
            "Python import error",
        ),
        ErrorPattern::line(Scripting, r"(?i)IndentationError:", "Python indentation error"),
        ErrorPattern::line(Scripting, r"(?i)SyntaxError:", "Python syntax error"),
        ErrorPattern::line(Scripting, r"(?i)NameError:", "Python name error"),
        ErrorPattern::line(Scripting, r"(?i)TypeError:", "Python type error"),
        ErrorPattern::line(Scripting, r"(?i)ValueError:", "Python value error"),
        ErrorPattern::line(Scripting, r"(?i)AttributeError:", "Python attribute error"),
        // structured data
        ErrorPattern::line(
            StructuredData,
            r"(?i)yaml\.(?:parser|scanner|reader)\.(?:Parser|Scanner|Reader)Error",
            "YAML parsing error",
        ),
        ErrorPattern::line(
            StructuredData,
            r"(?i)mapping values are not allowed here",
            "YAML mapping error",
        ),
        ErrorPattern::line(
            StructuredData,
            r"(?i)found character '\\t' that cannot start any token",
            "YAML tab character error",
        ),
        ErrorPattern::line(
            StructuredData,
            r"(?i)found unexpected end of stream",
            "YAML unexpected end",
        ),
        ErrorPattern::line(
            StructuredData,
            r"(?i)expected <?[^>]+>, but found",
            "YAML unexpected token",
        ),
        ErrorPattern::line(
            StructuredData,
            r"(?i)block sequence entries are not allowed here",
            "YAML block sequence error",
        ),
        // config management
        ErrorPattern::block(
            ConfigMgmt,
            r"(?i)fatal:\s*\[.*?\]:\s*FAILED!",
            r"fatal:\s*\[.*?\]:\s*FAILED!\s*=>\s*\{",
            "Ansible task failure",
        ),
        ErrorPattern::line(ConfigMgmt, r"(?i)ERROR!\s*(.*)", "Ansible error"),
    ]
});

/// The full catalog in priority order: common, scripting, structured-data,
/// config-mgmt.
pub fn catalog() -> &'static [ErrorPattern] {
    &CATALOG
}

/// First pattern in catalog order matching `line`.
pub fn first_match(line: &str) -> Option<&'static ErrorPattern> {
    catalog().iter().find(|p| p.is_match(line))
}

/// First multi-line pattern whose block start matches `line`, with the byte
/// offset just past the opening brace.
pub fn block_trigger(line: &str) -> Option<(&'static ErrorPattern, usize)> {
    catalog().iter().find_map(|p| {
        let m = p.block_start.as_ref()?.find(line)?;
        Some((p, m.end()))
    })
}
