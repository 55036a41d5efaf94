use std::sync::LazyLock;

use regex::Regex;
use serde_yaml_ng::Mapping;
use serde_yaml_ng::Value;

use crate::issues::DocumentIssue;
use crate::paths::title_case;

/// Derived descriptions shorter than this are discarded.
pub const MIN_DESCRIPTION_CHARS: usize = 10;
/// Derived descriptions longer than this are discarded.
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Front matter keys that only make sense to the source framework.
const DROPPED_KEYS: [&str; 10] = [
	"id",
	"slug",
	"sidebar_position",
	"sidebar_label",
	"hide_title",
	"hide_table_of_contents",
	"pagination_next",
	"pagination_prev",
	"custom_edit_url",
	"displayed_sidebar",
];

/// Keys read into dedicated [`DocumentMeta`] fields.
const MAPPED_KEYS: [&str; 3] = ["title", "description", "icon"];

static LINK_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid link regex"));
static EMPHASIS_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(\*\*|__|\*|`)").expect("valid emphasis regex"));
static HEADING_ANCHOR_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\s*\{#[^}]*\}\s*$").expect("valid anchor regex"));
static SETEXT_H1_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^ {0,3}=+[ \t]*$").expect("valid setext regex"));
static LIST_ITEM_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]\s|\d+[.)]\s)").expect("valid list regex"));

/// Where the document title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
	/// An explicit `title` front matter field.
	Metadata,
	/// The first top-level heading, which was removed from the body.
	Heading,
	/// Synthesized from the file name.
	FileName,
}

/// Structured metadata of a document. `title` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
	pub title: String,
	pub title_source: TitleSource,
	pub description: Option<String>,
	/// Position among siblings in the navigation tree.
	pub ordering: Option<i64>,
	pub icon: Option<String>,
	/// Shorter label for navigation (`sidebar_label`).
	pub sidebar_title: Option<String>,
	/// Route override. A leading `/` roots it at the version.
	pub slug: Option<String>,
	/// Replaces the last route segment.
	pub id: Option<String>,
	/// Remaining front matter keys, carried through unchanged.
	pub extra: Mapping,
}

/// A document split into metadata and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
	pub meta: DocumentMeta,
	/// Body text with the front matter removed. A title heading is replaced
	/// with an empty line so body line numbers stay aligned.
	pub body: String,
	/// Number of source lines that precede the body.
	pub body_line_offset: usize,
}

/// Split a leading `---` delimited YAML block from the body. Returns the YAML
/// text, the body and the number of lines the block occupied.
pub fn split_front_matter(raw: &str) -> (Option<&str>, &str, usize) {
	let Some(rest) = raw.strip_prefix("---\n") else {
		return (None, raw, 0);
	};

	let mut offset = 0;
	let mut lines = 1;
	for line in rest.split_inclusive('\n') {
		lines += 1;
		let trimmed = line.trim_end();
		if trimmed == "---" || trimmed == "..." {
			let yaml = &rest[..offset];
			let body = &rest[offset + line.len()..];
			return (Some(yaml), body, lines);
		}
		offset += line.len();
	}

	(None, raw, 0)
}

/// Parse the raw text of one document.
///
/// Title precedence: front matter `title`, then the first level-one heading, ATX
/// or setext (which is removed from the body), then a title built from the file name.
/// Description precedence: front matter `description`, then the first usable
/// paragraph after the leading heading, else none.
pub fn parse_document(
	raw: &str,
	relative_path: &str,
	issues: &mut Vec<DocumentIssue>,
) -> ParsedDocument {
	let (yaml, body, body_line_offset) = split_front_matter(raw);
	let mapping = yaml
		.map(|yaml| parse_front_matter(yaml, issues))
		.unwrap_or_default();

	let mut title = string_field(&mapping, "title");
	let mut title_source = TitleSource::Metadata;
	let lines: Vec<&str> = body.split('\n').collect();
	let heading = find_title_heading(&lines);
	let mut removed_heading = None;

	if title.is_none() {
		if let Some(heading) = &heading {
			title = Some(heading.text.clone());
			title_source = TitleSource::Heading;
			removed_heading = Some(heading.lines());
		}
	}

	let title = title.unwrap_or_else(|| {
		title_source = TitleSource::FileName;
		title_from_file_name(relative_path)
	});

	let description = string_field(&mapping, "description").or_else(|| {
		let start = heading.as_ref().map_or(0, |heading| heading.lines().end);
		derive_description(&lines[start.min(lines.len())..])
	});

	let body = match removed_heading {
		Some(range) => {
			let mut lines = lines;
			for line in &mut lines[range] {
				*line = "";
			}
			lines.join("\n")
		}
		None => body.to_string(),
	};

	let mut extra = Mapping::new();
	for (key, value) in &mapping {
		let dropped = key
			.as_str()
			.is_some_and(|key| DROPPED_KEYS.contains(&key) || MAPPED_KEYS.contains(&key));
		if !dropped {
			extra.insert(key.clone(), value.clone());
		}
	}

	ParsedDocument {
		meta: DocumentMeta {
			title,
			title_source,
			description,
			ordering: ordering_field(&mapping, "sidebar_position"),
			icon: string_field(&mapping, "icon"),
			sidebar_title: string_field(&mapping, "sidebar_label"),
			slug: string_field(&mapping, "slug"),
			id: string_field(&mapping, "id"),
			extra,
		},
		body,
		body_line_offset,
	}
}

fn parse_front_matter(yaml: &str, issues: &mut Vec<DocumentIssue>) -> Mapping {
	match serde_yaml_ng::from_str::<Value>(yaml) {
		Ok(Value::Mapping(mapping)) => mapping,
		Ok(Value::Null) => Mapping::new(),
		Ok(_) => {
			issues.push(
				DocumentIssue::error("front matter is not a key/value mapping")
					.at_line(1)
					.with_suggestion("rewrite the front matter as `key: value` lines"),
			);
			Mapping::new()
		}
		Err(e) => {
			issues.push(
				DocumentIssue::error(format!("invalid front matter: {e}"))
					.at_line(1)
					.with_suggestion("fix the YAML; the block was dropped from the output"),
			);
			Mapping::new()
		}
	}
}

fn string_field(mapping: &Mapping, key: &str) -> Option<String> {
	let value = match mapping.get(key)? {
		Value::String(s) => s.trim().to_string(),
		Value::Number(n) => n.to_string(),
		Value::Bool(b) => b.to_string(),
		_ => return None,
	};

	(!value.is_empty()).then_some(value)
}

fn ordering_field(mapping: &Mapping, key: &str) -> Option<i64> {
	match mapping.get(key)? {
		Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
		Value::String(s) => s
			.trim()
			.parse::<i64>()
			.ok()
			.or_else(|| s.trim().parse::<f64>().ok().map(|f| f.floor() as i64)),
		_ => None,
	}
}

/// True for lines that open or close a fenced code block.
fn is_fence(line: &str) -> bool {
	let trimmed = line.trim_start();
	trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// A level-one heading found in the body.
struct TitleHeading {
	/// Index of the heading's first line.
	line: usize,
	/// Setext headings span their text line and the `===` underline.
	setext: bool,
	text: String,
}

impl TitleHeading {
	fn lines(&self) -> std::ops::Range<usize> {
		self.line..self.line + if self.setext { 2 } else { 1 }
	}
}

/// Find the first level-one heading, ATX (`# Title`) or setext (`Title`
/// underlined with `=`), outside fenced code.
fn find_title_heading(lines: &[&str]) -> Option<TitleHeading> {
	let mut in_fence = false;
	for (index, line) in lines.iter().enumerate() {
		if is_fence(line) {
			in_fence = !in_fence;
			continue;
		}
		if in_fence {
			continue;
		}

		let indent = line.len() - line.trim_start_matches(' ').len();
		if indent > 3 {
			continue;
		}

		if let Some(text) = line.trim_start().strip_prefix("# ") {
			let text = HEADING_ANCHOR_RE.replace(text, "");
			let text = clean_inline(text.trim().trim_end_matches('#').trim());
			if !text.is_empty() {
				return Some(TitleHeading {
					line: index,
					setext: false,
					text,
				});
			}
			continue;
		}

		if is_setext_text(lines, index) {
			let text = clean_inline(HEADING_ANCHOR_RE.replace(line.trim(), "").trim());
			if !text.is_empty() {
				return Some(TitleHeading {
					line: index,
					setext: true,
					text,
				});
			}
		}
	}

	None
}

/// A single paragraph line directly underlined with `=`.
fn is_setext_text(lines: &[&str], index: usize) -> bool {
	let line = lines[index].trim();
	let starts_block = line.is_empty()
		|| line.starts_with(['#', '>', '<', '|', '='])
		|| LIST_ITEM_RE.is_match(line);
	let follows_paragraph = index > 0 && !lines[index - 1].trim().is_empty();

	!starts_block
		&& !follows_paragraph
		&& lines
			.get(index + 1)
			.is_some_and(|underline| SETEXT_H1_RE.is_match(underline))
}

fn clean_inline(text: &str) -> String {
	let text = LINK_RE.replace_all(text, "$1");
	let text = EMPHASIS_RE.replace_all(&text, "");
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First paragraph before the next heading that is plain prose and fits the
/// length window.
fn derive_description(lines: &[&str]) -> Option<String> {
	let mut in_fence = false;
	let mut paragraph: Vec<&str> = Vec::new();

	let accept = |paragraph: &[&str]| -> Option<String> {
		if paragraph.is_empty() || !is_prose(paragraph) {
			return None;
		}
		let text = clean_inline(&paragraph.join(" "));
		let length = text.chars().count();
		(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS)
			.contains(&length)
			.then_some(text)
	};

	for line in lines {
		if is_fence(line) {
			in_fence = !in_fence;
			paragraph.clear();
			continue;
		}
		if in_fence {
			continue;
		}

		if line.trim_start().starts_with('#') {
			break;
		}

		if line.trim().is_empty() {
			if let Some(text) = accept(&paragraph) {
				return Some(text);
			}
			paragraph.clear();
		} else {
			paragraph.push(line);
		}
	}

	if in_fence {
		return None;
	}

	accept(&paragraph)
}

fn is_prose(paragraph: &[&str]) -> bool {
	paragraph.iter().all(|line| {
		let trimmed = line.trim_start();
		!(trimmed.contains('|')
			|| trimmed.starts_with('<')
			|| trimmed.starts_with(":::")
			|| trimmed.starts_with('>')
			|| trimmed.starts_with('{')
			|| trimmed.starts_with("![")
			|| trimmed.starts_with("import ")
			|| trimmed.starts_with("export ")
			|| LIST_ITEM_RE.is_match(line))
	})
}

/// Build a title from the last path segment. `index` and `README` files take
/// the name of their directory.
pub fn title_from_file_name(relative_path: &str) -> String {
	let mut segments = relative_path.rsplit('/').filter(|s| !s.is_empty());
	let file_name = segments.next().unwrap_or(relative_path);
	let stem = crate::paths::strip_document_extension(file_name);
	let name = if stem.eq_ignore_ascii_case("index") || stem.eq_ignore_ascii_case("readme") {
		segments.next().unwrap_or(stem)
	} else {
		stem
	};

	let title = title_case(name);
	if title.is_empty() {
		"Untitled".to_string()
	} else {
		title
	}
}

/// Render the target framework's front matter block.
pub fn render_front_matter(meta: &DocumentMeta) -> String {
	let mut mapping = Mapping::new();
	mapping.insert(Value::from("title"), Value::from(meta.title.as_str()));
	if let Some(description) = &meta.description {
		mapping.insert(Value::from("description"), Value::from(description.as_str()));
	}
	if let Some(sidebar_title) = &meta.sidebar_title {
		mapping.insert(Value::from("sidebarTitle"), Value::from(sidebar_title.as_str()));
	}
	if let Some(icon) = &meta.icon {
		mapping.insert(Value::from("icon"), Value::from(icon.as_str()));
	}
	for (key, value) in &meta.extra {
		mapping.insert(key.clone(), value.clone());
	}

	let yaml = serde_yaml_ng::to_string(&Value::Mapping(mapping))
		.unwrap_or_else(|_| format!("title: {:?}\n", meta.title));
	format!("---\n{yaml}---\n")
}
