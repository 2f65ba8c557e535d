pub mod brace_block;
pub mod line_scan;

use crate::normalize::normalize_line;

/// Excerpts extracted from one job's log, in log order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedJobResult {
    pub job_name: String,
    pub errors: Vec<String>,
}

/// Extraction strategy for a job's log dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Unit-test failure blocks, or single-line catalog matches.
    Default,
    /// Brace-balanced `fatal: [host]: FAILED! => {...}` payloads.
    StructuredBlock,
}

impl Extractor {
    /// Pick the extractor for a job by its display name.
    pub fn for_job(job_name: &str) -> Self {
        if job_name.to_lowercase().contains("integration") {
            Extractor::StructuredBlock
        } else {
            Extractor::Default
        }
    }

    pub fn extract(self, log: &str, job_name: &str) -> ParsedJobResult {
        let errors = match self {
            Extractor::Default => line_scan::extract(log, job_name),
            Extractor::StructuredBlock => brace_block::extract(log),
        };
        ParsedJobResult {
            job_name: job_name.to_string(),
            errors,
        }
    }
}

/// Normalized, non-empty lines of a raw log body.
fn normalized_lines(log: &str) -> impl Iterator<Item = String> + '_ {
    log.lines().map(normalize_line).filter(|l| !l.is_empty())
}
