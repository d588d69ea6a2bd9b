//! Problem-report extraction from decoded log artifacts
//!
//! A report is the decoded text file uploaded by the desktop client. Two
//! header lines identify the submitter:
//!
//! ```text
//! #User Name: Jane Doe
//! #User e-mail: jane@example.org
//! ```
//!
//! [`scan_file`] reads at most `max_lines + 1` lines, pulls those two fields
//! out, and accumulates the lines into a notification body that starts with
//! the artifact's path. Each line is cut at `max_line_bytes`; the rest of an
//! overlong line is skipped without being buffered.

use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};

pub const NAME_TAG: &str = "#User Name:";
pub const EMAIL_TAG: &str = "#User e-mail:";

/// Characters kept after a tag, before trimming
pub const MAX_TAG_VALUE_CHARS: usize = 256;

pub const DEFAULT_MAX_LINES: usize = 10_000;

pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

pub const DEFAULT_SUBJECT_PREFIX: &str = "New Problem Report";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read report {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub body: String,
    pub lines_read: usize,
    /// More lines remained after the scan stopped
    pub truncated: bool,
}

impl ReportSummary {
    /// `"<prefix>: <YYYY-MM-DD> <name>"`; the name is dropped when unknown
    pub fn subject(&self, prefix: &str, date: NaiveDate) -> String {
        let subject = format!(
            "{}: {} {}",
            prefix,
            date.format("%Y-%m-%d"),
            self.submitter_name.as_deref().unwrap_or("")
        );
        subject.trim_end().to_string()
    }
}

/// Value following `tag` on `line`, bounded and trimmed
fn tag_value(line: &str, tag: &str) -> Option<String> {
    let rest = line.strip_prefix(tag)?;
    let bounded: String = rest.chars().take(MAX_TAG_VALUE_CHARS).collect();
    let value = bounded.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Consume input up to and including the next newline
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

/// Scan a report from any buffered reader
///
/// The first line carrying each tag wins. Invalid UTF-8 is replaced rather
/// than rejected.
pub async fn scan_lines<R>(
    mut reader: R,
    path: &Path,
    max_lines: usize,
    max_line_bytes: usize,
) -> std::io::Result<ReportSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReportSummary {
        body: format!("{}\n", path.display()),
        ..Default::default()
    };

    let mut raw = Vec::new();
    loop {
        raw.clear();
        let read = (&mut reader)
            .take(max_line_bytes as u64)
            .read_until(b'\n', &mut raw)
            .await?;
        if read == 0 {
            break;
        }

        if summary.lines_read > max_lines {
            summary.truncated = true;
            break;
        }
        summary.lines_read += 1;

        if raw.last() != Some(&b'\n') && read == max_line_bytes {
            skip_line(&mut reader).await?;
        }

        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end();

        if summary.submitter_name.is_none() {
            summary.submitter_name = tag_value(line, NAME_TAG);
        }
        if summary.submitter_email.is_none() {
            summary.submitter_email = tag_value(line, EMAIL_TAG);
        }

        summary.body.push_str(line);
        summary.body.push('\n');
    }

    Ok(summary)
}

/// Scan the decoded artifact at `path`
pub async fn scan_file(
    path: &Path,
    max_lines: usize,
    max_line_bytes: usize,
) -> Result<ReportSummary, ReportError> {
    let read_err = |source| ReportError::Read {
        path: path.display().to_string(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(read_err)?;
    let summary = scan_lines(BufReader::new(file), path, max_lines, max_line_bytes)
        .await
        .map_err(read_err)?;

    tracing::debug!(
        path = %path.display(),
        lines = summary.lines_read,
        truncated = summary.truncated,
        has_name = summary.submitter_name.is_some(),
        has_email = summary.submitter_email.is_some(),
        "Report scanned"
    );

    Ok(summary)
}
