use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

/// Length of the message prefix that takes part in issue deduplication.
const FINGERPRINT_PREFIX_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Error,
	Warning,
	/// Informational, mostly content that was removed rather than converted.
	Info,
}

impl std::fmt::Display for Severity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Error => write!(f, "error"),
			Self::Warning => write!(f, "warning"),
			Self::Info => write!(f, "info"),
		}
	}
}

/// A problem found while transforming one document. It has no file yet:
/// the same issue list is replayed for every path that shares the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentIssue {
	/// 1-indexed line in the source document, when known.
	pub line: Option<usize>,
	pub severity: Severity,
	pub message: String,
	pub suggestion: Option<String>,
}

impl DocumentIssue {
	pub fn new(severity: Severity, message: impl Into<String>) -> Self {
		Self {
			line: None,
			severity,
			message: message.into(),
			suggestion: None,
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self::new(Severity::Error, message)
	}

	pub fn warning(message: impl Into<String>) -> Self {
		Self::new(Severity::Warning, message)
	}

	pub fn info(message: impl Into<String>) -> Self {
		Self::new(Severity::Info, message)
	}

	#[must_use]
	pub fn at_line(mut self, line: usize) -> Self {
		self.line = Some(line);
		self
	}

	#[must_use]
	pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
		self.suggestion = Some(suggestion.into());
		self
	}

	/// Shift the line number by `offset` lines.
	#[must_use]
	pub fn offset_lines(mut self, offset: usize) -> Self {
		self.line = self.line.map(|line| line + offset);
		self
	}
}

/// An issue attached to a specific migrated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationIssue {
	pub file: String,
	pub line: Option<usize>,
	pub severity: Severity,
	pub message: String,
	pub suggestion: Option<String>,
}

/// Collects issues for one migration run.
///
/// The orchestrator sets the current file before each document; every
/// recorded [`DocumentIssue`] is attached to it. Issues are deduplicated by
/// file, line and message prefix so replaying a cached document's issues
/// under the same path twice does not double-report.
#[derive(Debug, Default)]
pub struct IssueReporter {
	current_file: Option<String>,
	issues: Vec<MigrationIssue>,
	fingerprints: HashSet<(String, Option<usize>, String)>,
}

impl IssueReporter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_current_file(&mut self, file: impl Into<String>) {
		self.current_file = Some(file.into());
	}

	pub fn current_file(&self) -> Option<&str> {
		self.current_file.as_deref()
	}

	/// Record an issue against the current file. Returns `false` when the
	/// issue was a duplicate. Issues recorded before any file is set are
	/// attached to `<run>`.
	pub fn record(&mut self, issue: DocumentIssue) -> bool {
		let file = self
			.current_file
			.clone()
			.unwrap_or_else(|| "<run>".to_string());
		self.record_for(file, issue)
	}

	/// Record an issue against an explicit file.
	pub fn record_for(&mut self, file: impl Into<String>, issue: DocumentIssue) -> bool {
		let file = file.into();
		let prefix: String = issue.message.chars().take(FINGERPRINT_PREFIX_LEN).collect();
		if !self.fingerprints.insert((file.clone(), issue.line, prefix)) {
			return false;
		}

		self.issues.push(MigrationIssue {
			file,
			line: issue.line,
			severity: issue.severity,
			message: issue.message,
			suggestion: issue.suggestion,
		});
		true
	}

	pub fn issues(&self) -> &[MigrationIssue] {
		&self.issues
	}

	pub fn into_issues(self) -> Vec<MigrationIssue> {
		self.issues
	}

	pub fn count(&self, severity: Severity) -> usize {
		self.issues
			.iter()
			.filter(|issue| issue.severity == severity)
			.count()
	}

	pub fn has_errors(&self) -> bool {
		self.count(Severity::Error) > 0
	}

	pub fn is_empty(&self) -> bool {
		self.issues.is_empty()
	}

	/// Render a grouped, human-readable summary: errors, then warnings, then
	/// informational removals, each grouped by file.
	pub fn generate_report(&self) -> String {
		render_report(&self.issues)
	}
}

/// Render a report for an arbitrary issue list.
pub fn render_report(issues: &[MigrationIssue]) -> String {
	let mut out = String::from("Migration report\n================\n");

	if issues.is_empty() {
		out.push_str("\nNo issues found.\n");
		return out;
	}

	let sections = [
		(Severity::Error, "Errors"),
		(Severity::Warning, "Warnings"),
		(Severity::Info, "Removed or changed content"),
	];

	for (severity, title) in sections {
		let mut by_file: BTreeMap<&str, Vec<&MigrationIssue>> = BTreeMap::new();
		for issue in issues.iter().filter(|issue| issue.severity == severity) {
			by_file.entry(issue.file.as_str()).or_default().push(issue);
		}

		if by_file.is_empty() {
			continue;
		}

		let count: usize = by_file.values().map(Vec::len).sum();
		let heading = format!("{title} ({count})");
		let _ = write!(out, "\n{heading}\n{}\n", "-".repeat(heading.len()));

		for (file, file_issues) in by_file {
			let _ = writeln!(out, "{file}");
			for issue in file_issues {
				match issue.line {
					Some(line) => {
						let _ = writeln!(out, "  - line {line}: {}", issue.message);
					}
					None => {
						let _ = writeln!(out, "  - {}", issue.message);
					}
				}
				if let Some(suggestion) = &issue.suggestion {
					let _ = writeln!(out, "    suggestion: {suggestion}");
				}
			}
		}
	}

	let files: HashSet<&str> = issues.iter().map(|issue| issue.file.as_str()).collect();
	let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();
	let _ = writeln!(
		out,
		"\nSummary: {} error(s), {} warning(s), {} info across {} file(s).",
		count(Severity::Error),
		count(Severity::Warning),
		count(Severity::Info),
		files.len()
	);

	out
}
