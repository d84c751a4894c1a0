//! Mismatch report accumulated by a run and its text rendering.

use serde::Serialize;
use std::fmt;

use crate::probe::ProbeOutcome;
use crate::types::Action;

/// Rendered in place of mismatch lines when every probe matched its expectation.
pub const NO_MISMATCHES_LINE: &str =
    "No mismatches: every probed permission matched its expectation";

/// A probed tuple whose observed outcome disagrees with its effective expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchEntry {
    pub iam: String,
    pub bucket: String,
    pub resource: String,
    pub action: Action,
    pub expected: bool,
    pub actual: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// A matrix entry that was not probed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub iam: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub reason: String,
}

impl SkippedEntry {
    pub fn iam(iam: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            iam: iam.into(),
            bucket: None,
            resource: None,
            reason: reason.into(),
        }
    }

    pub fn resource(
        iam: impl Into<String>,
        bucket: Option<&str>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            iam: iam.into(),
            bucket: bucket.map(str::to_string),
            resource: Some(resource.into()),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IAM '{}'", self.iam)?;
        if let Some(bucket) = &self.bucket {
            write!(f, " / bucket '{bucket}'")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, " / resource '{resource}'")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// The outcome of one run: every mismatch in probe order plus run diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub mismatches: Vec<MismatchEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub probes_executed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one probe and append a mismatch entry when `outcome` disagrees with `expected`.
    pub fn record(
        &mut self,
        iam: &str,
        bucket: &str,
        resource: &str,
        action: Action,
        expected: bool,
        outcome: ProbeOutcome,
    ) {
        self.probes_executed += 1;
        if outcome.succeeded == expected {
            return;
        }
        self.mismatches.push(MismatchEntry {
            iam: iam.to_string(),
            bucket: bucket.to_string(),
            resource: resource.to_string(),
            action,
            expected,
            actual: outcome.succeeded,
            error_message: outcome.error_message,
            error_detail_path: outcome.error_detail_path,
            error_kind: outcome.error_kind,
        });
    }

    pub fn skip(&mut self, entry: SkippedEntry) {
        self.skipped.push(entry);
    }

    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }
}

fn permission_label(allowed: bool) -> &'static str {
    if allowed {
        "ALLOWED"
    } else {
        "NOT ALLOWED"
    }
}

/// Render one mismatch as a single report line.
pub fn format_entry(entry: &MismatchEntry) -> String {
    format!(
        "IAM: {} / bucket: {} / resource: {} / action: {} / expected result: {} / test result: {} / main error: {} / add infos: {} / error type: {}",
        entry.iam,
        entry.bucket,
        entry.resource,
        entry.action,
        permission_label(entry.expected),
        permission_label(entry.actual),
        entry.error_message.as_deref().unwrap_or(""),
        entry.error_detail_path.as_deref().unwrap_or(""),
        entry.error_kind.as_deref().unwrap_or(""),
    )
}

/// Render a report as display lines.
///
/// One line per mismatch, or [`NO_MISMATCHES_LINE`] when there are none, followed by
/// one line per skipped entry and a final line if the run was aborted.
pub fn format_report(report: &Report) -> Vec<String> {
    let mut lines: Vec<String> = if report.mismatches.is_empty() {
        vec![NO_MISMATCHES_LINE.to_string()]
    } else {
        report.mismatches.iter().map(format_entry).collect()
    };

    lines.extend(
        report
            .skipped
            .iter()
            .map(|skipped| format!("Skipped {skipped}")),
    );

    if let Some(reason) = &report.aborted {
        lines.push(format!("Run aborted: {reason}"));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied(kind: &str, path: Option<&str>) -> ProbeOutcome {
        ProbeOutcome::failed("Access Denied", path.map(str::to_string), kind)
    }

    #[test]
    fn test_record_ignores_matching_outcomes() {
        let mut report = Report::new();
        report.record("alice", "b1", "docs", Action::ListBucket, true, ProbeOutcome::passed());
        report.record(
            "alice",
            "b1",
            "docs",
            Action::PutObject,
            false,
            denied("AccessDenied", Some("docs/test_file")),
        );

        assert_eq!(report.probes_executed, 2);
        assert!(!report.has_mismatches());
    }

    #[test]
    fn test_record_captures_error_detail() {
        let mut report = Report::new();
        report.record(
            "alice",
            "b1",
            "docs",
            Action::GetObject,
            true,
            denied("AccessDenied", Some("docs/test_file")),
        );

        assert_eq!(report.mismatches.len(), 1);
        let entry = &report.mismatches[0];
        assert!(entry.expected);
        assert!(!entry.actual);
        assert_eq!(entry.error_detail_path.as_deref(), Some("docs/test_file"));
        assert_eq!(entry.error_kind.as_deref(), Some("AccessDenied"));
    }

    #[test]
    fn test_format_empty_report() {
        let lines = format_report(&Report::new());
        assert_eq!(lines, vec![NO_MISMATCHES_LINE.to_string()]);
    }

    #[test]
    fn test_format_mismatch_line() {
        let mut report = Report::new();
        report.record(
            "alice",
            "b1",
            "report.csv",
            Action::PutObject,
            false,
            ProbeOutcome::passed(),
        );

        let lines = format_report(&report);
        assert_eq!(
            lines,
            vec![
                "IAM: alice / bucket: b1 / resource: report.csv / action: PutObject / expected result: NOT ALLOWED / test result: ALLOWED / main error:  / add infos:  / error type: "
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_format_appends_skipped_and_aborted() {
        let mut report = Report::new();
        report.skip(SkippedEntry::iam("bob", "no 'resources' mapping"));
        report.skip(SkippedEntry::resource(
            "carol",
            Some("b2"),
            "docs",
            "'actions' must be a mapping",
        ));
        report.aborted = Some("interrupted".into());

        let lines = format_report(&report);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], NO_MISMATCHES_LINE);
        assert_eq!(lines[1], "Skipped IAM 'bob': no 'resources' mapping");
        assert_eq!(
            lines[2],
            "Skipped IAM 'carol' / bucket 'b2' / resource 'docs': 'actions' must be a mapping"
        );
        assert_eq!(lines[3], "Run aborted: interrupted");
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = Report::new();
        report.record(
            "alice",
            "b1",
            "docs",
            Action::MultipartUpload,
            true,
            denied("MissingUploadSession", Some("docs/test_file")),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mismatches"][0]["action"], "MultipartUpload");
        assert_eq!(json["mismatches"][0]["error_kind"], "MissingUploadSession");
        assert_eq!(json["probes_executed"], 1);
        assert!(json.get("aborted").is_none());
    }
}
