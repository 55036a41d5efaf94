//! Markup repair pass: comments, disclosure elements, placeholder tags and
//! bare operators in prose.

use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;

use crate::issues::DocumentIssue;
use crate::tree::Document;
use crate::tree::NodeKind;

static COMMENT_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?s)<!--(.*?)-->").expect("valid comment regex"));

static DISCLOSURE_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?is)<!--.*?-->|<details(\s[^>]*)?>|</details\s*>|<summary(?:\s[^>]*)?>(.*?)</summary\s*>|</?summary(?:\s[^>]*)?>",
	)
	.expect("valid disclosure regex")
});

static ACCORDION_MARKER_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"@@ACCORDION_(\d+)@@").expect("valid marker regex"));

static TAG_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static PLACEHOLDER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^<([A-Za-z][A-Za-z0-9_.-]*)>$").expect("valid placeholder tag regex")
});

static OPERATOR_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"<=|>=|=>|->|<-").expect("valid operator regex"));

static LESS_THAN_DIGIT_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"<(\d)").expect("valid less-than regex"));

/// Lowercase names that are real HTML elements and stay markup.
pub const HTML_ELEMENTS: &[&str] = &[
	"a", "abbr", "article", "aside", "audio", "b", "blockquote", "body", "br", "button",
	"caption", "center", "cite", "code", "col", "colgroup", "dd", "del", "details", "div", "dl",
	"dt", "em", "figcaption", "figure", "font", "footer", "form", "h1", "h2", "h3", "h4", "h5",
	"h6", "head", "header", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "label",
	"li", "link", "main", "mark", "meta", "nav", "ol", "option", "p", "path", "picture", "pre",
	"q", "s", "script", "section", "select", "small", "source", "span", "strong", "style", "sub",
	"summary", "sup", "svg", "table", "tbody", "td", "textarea", "tfoot", "th", "thead", "title",
	"tr", "u", "ul", "video",
];

/// A component name: an uppercase first letter and at least one lowercase
/// letter. `Tabs` and `TabItem` are components, `T` and `URL` are not.
pub fn is_component_name(name: &str) -> bool {
	name.chars().next().is_some_and(char::is_uppercase) && name.chars().any(char::is_lowercase)
}

/// Run the markup repairs over every node of the document.
pub fn repair_markup(
	document: &mut Document,
	max_comment_length: usize,
	issues: &mut Vec<DocumentIssue>,
) {
	convert_placeholders(document);

	let mut blocks: Vec<(usize, String)> = Vec::new();
	document.walk(&mut |node| {
		if let NodeKind::Html(html) = &node.kind {
			blocks.push((node.line, html.clone()));
		}
	});

	let suffix = convert_disclosures(&mut blocks, issues);
	document.suffix.push_str(&suffix);
	for (line, html) in &mut blocks {
		*html = convert_comments(html, *line, max_comment_length, issues);
	}

	let mut converted = blocks.into_iter().map(|(_, html)| html);
	document.walk_mut(&mut |node| {
		match &node.kind {
			NodeKind::Html(_) => {
				if let Some(html) = converted.next() {
					node.set_text(html);
				}
			}
			NodeKind::Text(text) => {
				let escaped = escape_operators(text);
				node.set_text(escaped);
			}
			_ => {}
		}
	});
}

/// `<name>` placeholders written as raw markup become inline code.
fn convert_placeholders(document: &mut Document) {
	document.walk_mut(&mut |node| {
		let NodeKind::Html(html) = &node.kind else {
			return;
		};
		let Some(caps) = PLACEHOLDER_TAG_RE.captures(html.trim()) else {
			return;
		};

		let name = &caps[1];
		if is_component_name(name) || HTML_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
			return;
		}

		node.kind = NodeKind::InlineCode(html.trim().to_string());
		node.touched = true;
	});
}

/// `<!-- text -->` becomes `{/* text */}`. Comments longer than
/// `max_comment_length` characters are removed and reported.
pub fn convert_comments(
	html: &str,
	line: usize,
	max_comment_length: usize,
	issues: &mut Vec<DocumentIssue>,
) -> String {
	let mut converted = COMMENT_RE
		.replace_all(html, |caps: &Captures<'_>| {
			let content = caps[1].trim();
			let length = content.chars().count();
			if length > max_comment_length {
				issues.push(
					DocumentIssue::info(format!("removed a comment of {length} characters"))
						.at_line(line)
						.with_suggestion("move long notes out of comments if they are still needed"),
				);
				return String::new();
			}
			if content.is_empty() {
				return String::new();
			}

			format!("{{/* {} */}}", content.replace("*/", "*\\/"))
		})
		.into_owned();

	if converted.contains("<!--") {
		issues.push(
			DocumentIssue::warning("comment is never closed; the opening `<!--` was removed")
				.at_line(line)
				.with_suggestion("close the comment with `-->`"),
		);
		converted = converted.replace("<!--", "");
	}

	converted
}

#[derive(Debug)]
struct Disclosure {
	id: usize,
	open: bool,
	title: Option<String>,
	line: usize,
}

fn summary_title(inner: &str) -> String {
	let text = TAG_RE.replace_all(inner, "");
	text.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ")
		.replace('"', "&quot;")
}

/// Convert `<details>`/`<summary>` into `<Accordion>` across all raw markup
/// blocks of a document, in order. The opening and closing halves may sit in
/// different blocks. Returns closing tags to append at the end of the
/// document for disclosures that are never closed.
fn convert_disclosures(blocks: &mut [(usize, String)], issues: &mut Vec<DocumentIssue>) -> String {
	let mut stack: Vec<Disclosure> = Vec::new();
	let mut finished: Vec<Disclosure> = Vec::new();
	let mut next_id = 0;

	for (line, html) in blocks.iter_mut() {
		let line = *line;
		*html = DISCLOSURE_RE
			.replace_all(html, |caps: &Captures<'_>| {
				let token = caps[0].to_ascii_lowercase();
				if token.starts_with("<!--") {
					return caps[0].to_string();
				}
				if token.starts_with("<details") {
					let open = caps
						.get(1)
						.is_some_and(|attrs| attrs.as_str().to_ascii_lowercase().contains("open"));
					let id = next_id;
					next_id += 1;
					stack.push(Disclosure {
						id,
						open,
						title: None,
						line,
					});
					return format!("@@ACCORDION_{id}@@");
				}

				if token.starts_with("</details") {
					return match stack.pop() {
						Some(disclosure) => {
							finished.push(disclosure);
							"</Accordion>".to_string()
						}
						None => {
							issues.push(
								DocumentIssue::warning("`</details>` has no matching `<details>` and was removed")
									.at_line(line),
							);
							String::new()
						}
					};
				}

				let Some(inner) = caps.get(2) else {
					return String::new();
				};
				let title = summary_title(inner.as_str());
				match stack.last_mut() {
					Some(disclosure) if disclosure.title.is_none() => {
						disclosure.title = Some(title);
						String::new()
					}
					_ => format!("**{title}**"),
				}
			})
			.into_owned();
	}

	let mut suffix = String::new();
	while let Some(disclosure) = stack.pop() {
		issues.push(
			DocumentIssue::warning("`<details>` is never closed")
				.at_line(disclosure.line)
				.with_suggestion("a closing `</Accordion>` was added at the end of the document"),
		);
		suffix.push_str("\n</Accordion>\n");
		finished.push(disclosure);
	}

	for (_, html) in blocks.iter_mut() {
		if !html.contains("@@ACCORDION_") {
			continue;
		}
		*html = ACCORDION_MARKER_RE
			.replace_all(html, |caps: &Captures<'_>| {
				let disclosure = caps[1]
					.parse::<usize>()
					.ok()
					.and_then(|id| finished.iter().find(|d| d.id == id));
				let (title, open) = disclosure.map_or(("Details", false), |d| {
					(d.title.as_deref().unwrap_or("Details"), d.open)
				});
				if open {
					format!("<Accordion title=\"{title}\" defaultOpen>")
				} else {
					format!("<Accordion title=\"{title}\">")
				}
			})
			.into_owned();
	}

	suffix
}

/// Wrap bare comparison and arrow operators in inline code and escape `<`
/// before a digit.
pub fn escape_operators(text: &str) -> String {
	let wrapped = OPERATOR_RE.replace_all(text, "`$0`");
	LESS_THAN_DIGIT_RE
		.replace_all(&wrapped, "&lt;$1")
		.into_owned()
}
