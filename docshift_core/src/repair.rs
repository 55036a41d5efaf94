//! Text-level repairs applied after the tree passes.
//!
//! Each step is a pure `&str -> String` function run through
//! [`protect`](crate::protect), so none of them can see or change code. The
//! order of [`REPAIR_SEQUENCE`] matters: table cells are escaped before
//! template tokens are wrapped so an escaped brace is never wrapped again.
//! Running the sequence on its own output changes nothing.

use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;

use crate::issues::DocumentIssue;
use crate::markup::is_component_name;
use crate::protect::protect;

static ADMONITION_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^(\s*):::(note|tip|info|caution|warning|danger|important|success)(?:\[([^\]]*)\]|[ \t]+(.*?))?[ \t]*$",
	)
	.expect("valid admonition regex")
});

static ADMONITION_CLOSE_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(\s*):::[ \t]*$").expect("valid admonition close regex"));

static TEMPLATE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\$?\{\{[^{}\n]*\}\}|\$?\{[A-Za-z_][A-Za-z0-9_.]*\}").expect("valid template regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"<[A-Za-z][A-Za-z0-9.-]*(\s[^<>]*)>").expect("valid tag regex")
});

static ATTRIBUTE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(\s)(class|for|[a-z]+(?:-[a-z0-9]+)+)(\s*=)").expect("valid attribute regex")
});

static COMPONENT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"<(/?)([A-Z][A-Za-z0-9.]*)((?:\s+(?:[^<>"']|"[^"]*"|'[^']*')*)?)>"#)
		.expect("valid component tag regex")
});

static COMMENT_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?s)\{/\*.*?\*/\}").expect("valid comment regex"));

static BLANK_LINES_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid blank line regex"));

/// One text repair.
#[derive(Clone, Copy)]
pub struct RepairStep {
	pub name: &'static str,
	pub apply: fn(&str) -> String,
	/// Reports what the step is about to change, run on the step's input.
	pub audit: Option<fn(&str) -> Vec<DocumentIssue>>,
}

impl std::fmt::Debug for RepairStep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RepairStep")
			.field("name", &self.name)
			.finish_non_exhaustive()
	}
}

/// The repair steps in the order they run.
pub const REPAIR_SEQUENCE: [RepairStep; 6] = [
	RepairStep {
		name: "convert_admonitions",
		apply: convert_admonitions,
		audit: None,
	},
	RepairStep {
		name: "escape_table_cells",
		apply: escape_table_cells,
		audit: None,
	},
	RepairStep {
		name: "wrap_template_tokens",
		apply: wrap_template_tokens,
		audit: None,
	},
	RepairStep {
		name: "convert_attribute_names",
		apply: convert_attribute_names,
		audit: None,
	},
	RepairStep {
		name: "balance_component_tags",
		apply: balance_component_tags,
		audit: Some(audit_component_tags),
	},
	RepairStep {
		name: "collapse_blank_lines",
		apply: collapse_blank_lines,
		audit: None,
	},
];

/// Run every step of [`REPAIR_SEQUENCE`] over `text` with code protected.
pub fn run_repairs(text: &str, issues: &mut Vec<DocumentIssue>) -> String {
	let mut current = text.to_string();

	for step in &REPAIR_SEQUENCE {
		let protected = protect(&current);
		if let Some(audit) = step.audit {
			for mut issue in audit(&protected.text) {
				issue.line = issue.line.map(|line| protected.original_line(line));
				issues.push(issue);
			}
		}

		let repaired = (step.apply)(&protected.text);
		if repaired != protected.text {
			tracing::trace!(step = step.name, "repair step changed the document");
		}
		current = protected.restore(&repaired);
	}

	current
}

fn callout_for(kind: &str) -> &'static str {
	match kind {
		"tip" => "Tip",
		"info" | "important" => "Info",
		"caution" | "warning" | "danger" => "Warning",
		"success" => "Check",
		_ => "Note",
	}
}

/// `:::note` blocks become callout components. A title becomes a bold first
/// line. Unclosed blocks keep their opening tag for the tag balancer.
pub fn convert_admonitions(text: &str) -> String {
	let mut stack: Vec<&'static str> = Vec::new();
	let mut out: Vec<String> = Vec::new();

	for line in text.split('\n') {
		if let Some(caps) = ADMONITION_OPEN_RE.captures(line) {
			let indent = &caps[1];
			let component = callout_for(&caps[2].to_ascii_lowercase());
			stack.push(component);
			out.push(format!("{indent}<{component}>"));

			let title = caps
				.get(3)
				.or_else(|| caps.get(4))
				.map(|m| m.as_str().trim())
				.filter(|title| !title.is_empty());
			if let Some(title) = title {
				out.push(format!("{indent}**{title}**"));
				out.push(String::new());
			}
			continue;
		}

		if let Some(caps) = ADMONITION_CLOSE_RE.captures(line) {
			if let Some(component) = stack.pop() {
				out.push(format!("{}</{component}>", &caps[1]));
				continue;
			}
		}

		out.push(line.to_string());
	}

	out.join("\n")
}

/// Inside table rows, escape braces that are not already escaped or part of
/// a `{/* */}` comment, and turn a `<` that cannot start a tag into `&lt;`.
pub fn escape_table_cells(text: &str) -> String {
	text.split('\n')
		.map(|line| {
			if line.trim_start().starts_with('|') {
				escape_table_row(line)
			} else {
				line.to_string()
			}
		})
		.collect::<Vec<_>>()
		.join("\n")
}

fn escape_table_row(line: &str) -> String {
	let mut out = String::with_capacity(line.len() + 8);
	let mut rest = line;
	let mut previous: Option<char> = None;

	while let Some(c) = rest.chars().next() {
		if rest.starts_with("{/*") {
			if let Some(end) = rest.find("*/}") {
				out.push_str(&rest[..end + 3]);
				rest = &rest[end + 3..];
				previous = Some('}');
				continue;
			}
		}

		let escaped = previous == Some('\\');
		match c {
			'{' | '}' if !escaped => {
				out.push('\\');
				out.push(c);
			}
			'<' if !rest[1..]
				.chars()
				.next()
				.is_some_and(|next| next.is_ascii_alphabetic() || next == '/' || next == '!') =>
			{
				out.push_str("&lt;");
			}
			_ => out.push(c),
		}

		previous = Some(c);
		rest = &rest[c.len_utf8()..];
	}

	out
}

/// Wrap `{{ token }}` and `{token}` in inline code so they are not read as
/// expressions. Tokens after `\` or `=` (escaped braces and attribute
/// values) are left alone.
pub fn wrap_template_tokens(text: &str) -> String {
	TEMPLATE_TOKEN_RE
		.replace_all(text, |caps: &Captures<'_>| {
			let Some(token) = caps.get(0) else {
				return String::new();
			};
			let preceding = text[..token.start()].chars().next_back();
			if matches!(preceding, Some('\\' | '=' | '`')) {
				return token.as_str().to_string();
			}

			format!("`{}`", token.as_str())
		})
		.into_owned()
}

fn camel_case(name: &str) -> String {
	let mut out = String::with_capacity(name.len());
	for (index, part) in name.split('-').enumerate() {
		if index == 0 {
			out.push_str(part);
			continue;
		}
		let mut chars = part.chars();
		if let Some(first) = chars.next() {
			out.extend(first.to_uppercase());
			out.push_str(chars.as_str());
		}
	}
	out
}

/// Rename attributes inside tags: `class` to `className`, `for` to
/// `htmlFor` and hyphenated names to camel case. `data-*` and `aria-*` keep
/// their names.
pub fn convert_attribute_names(text: &str) -> String {
	TAG_RE
		.replace_all(text, |caps: &Captures<'_>| {
			ATTRIBUTE_NAME_RE
				.replace_all(&caps[0], |attr: &Captures<'_>| {
					let name = &attr[2];
					let renamed = match name {
						"class" => "className".to_string(),
						"for" => "htmlFor".to_string(),
						_ if name.starts_with("data-") || name.starts_with("aria-") => name.to_string(),
						_ => camel_case(name),
					};
					format!("{}{renamed}{}", &attr[1], &attr[3])
				})
				.into_owned()
		})
		.into_owned()
}

/// What a scan of component tags found.
#[derive(Debug, Default)]
struct TagScan {
	/// Byte ranges of closing tags without an opener.
	orphans: Vec<(std::ops::Range<usize>, String)>,
	/// Closing tags to insert before a byte offset, for components closed
	/// implicitly by an outer closing tag.
	implicit: Vec<(usize, String)>,
	/// Openers never closed, outermost first, with their byte offset.
	unclosed: Vec<(usize, String)>,
}

fn scan_component_tags(text: &str) -> TagScan {
	let mut scan = TagScan::default();
	let mut stack: Vec<(usize, String)> = Vec::new();
	let comments: Vec<_> = COMMENT_RE.find_iter(text).map(|m| m.range()).collect();

	for caps in COMPONENT_TAG_RE.captures_iter(text) {
		let Some(tag) = caps.get(0) else {
			continue;
		};
		if comments.iter().any(|comment| comment.contains(&tag.start())) {
			continue;
		}
		let name = caps[2].to_string();
		if !is_component_name(&name) || caps[3].trim_end().ends_with('/') {
			continue;
		}

		if caps[1].is_empty() {
			stack.push((tag.start(), name));
			continue;
		}

		match stack.iter().rposition(|(_, open)| *open == name) {
			Some(position) => {
				for (_, inner) in stack.drain(position + 1..).rev() {
					scan.implicit.push((tag.start(), inner));
				}
				stack.pop();
			}
			None => scan.orphans.push((tag.range(), name)),
		}
	}

	scan.unclosed = stack;
	scan
}

fn line_of(text: &str, offset: usize) -> usize {
	1 + text[..offset].matches('\n').count()
}

fn audit_component_tags(text: &str) -> Vec<DocumentIssue> {
	let scan = scan_component_tags(text);
	let mut issues = Vec::new();

	for (range, name) in &scan.orphans {
		issues.push(
			DocumentIssue::warning(format!("closing tag `</{name}>` has no opening tag and was removed"))
				.at_line(line_of(text, range.start)),
		);
	}
	for (offset, name) in &scan.implicit {
		issues.push(
			DocumentIssue::warning(format!("`<{name}>` was closed implicitly by an outer closing tag"))
				.at_line(line_of(text, *offset))
				.with_suggestion(format!("add `</{name}>` where the component should end")),
		);
	}
	for (offset, name) in &scan.unclosed {
		issues.push(
			DocumentIssue::warning(format!("`<{name}>` is never closed"))
				.at_line(line_of(text, *offset))
				.with_suggestion(format!("a closing `</{name}>` was added at the end of the document")),
		);
	}

	issues
}

/// Balance component tags with a stack: orphaned closing tags are dropped,
/// components left open inside a closing outer component are closed before
/// it, and components never closed get closing tags at the end.
pub fn balance_component_tags(text: &str) -> String {
	let scan = scan_component_tags(text);
	if scan.orphans.is_empty() && scan.implicit.is_empty() && scan.unclosed.is_empty() {
		return text.to_string();
	}

	enum Edit<'a> {
		Remove(std::ops::Range<usize>),
		Insert(usize, &'a str),
	}

	let mut edits: Vec<Edit<'_>> = scan
		.orphans
		.iter()
		.map(|(range, _)| Edit::Remove(range.clone()))
		.chain(
			scan.implicit
				.iter()
				.map(|(offset, name)| Edit::Insert(*offset, name.as_str())),
		)
		.collect();
	edits.sort_by_key(|edit| match edit {
		Edit::Remove(range) => range.start,
		Edit::Insert(offset, _) => *offset,
	});

	let mut out = String::with_capacity(text.len() + 32);
	let mut cursor = 0;
	for edit in edits {
		match edit {
			Edit::Remove(range) => {
				out.push_str(&text[cursor..range.start]);
				cursor = range.end;
			}
			Edit::Insert(offset, name) => {
				out.push_str(&text[cursor..offset]);
				out.push_str(&format!("</{name}>"));
				cursor = offset;
			}
		}
	}
	out.push_str(&text[cursor..]);

	for (_, name) in scan.unclosed.iter().rev() {
		if !out.ends_with('\n') {
			out.push('\n');
		}
		out.push_str(&format!("\n</{name}>\n"));
	}

	out
}

/// Collapse runs of blank lines into one.
pub fn collapse_blank_lines(text: &str) -> String {
	BLANK_LINES_RE.replace_all(text, "\n\n").into_owned()
}
