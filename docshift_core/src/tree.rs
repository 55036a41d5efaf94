//! A lossless structural tree over a markdown body.
//!
//! The tree is built from the `markdown` crate's mdast, but every node keeps
//! the byte span it came from. Rendering copies source bytes for everything a
//! pass did not touch, so untouched content round-trips byte for byte and only
//! the edited nodes are re-serialized.

use std::ops::Range;

use markdown::ParseOptions;
use markdown::mdast;
use markdown::to_mdast;

use crate::transform::TransformError;

/// A parsed document body.
#[derive(Debug, Clone)]
pub struct Document {
	source: String,
	pub children: Vec<Node>,
	/// Text appended after the last node, for closing tags synthesized by a
	/// pass.
	pub suffix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
	/// Byte range in the source body.
	pub span: Range<usize>,
	/// 1-indexed line in the source body.
	pub line: usize,
	pub kind: NodeKind,
	/// Set when a pass changed the node. Touched nodes are rendered from
	/// their fields instead of the source bytes.
	pub touched: bool,
}

/// The closed set of node kinds every pass handles.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
	Heading { depth: u8, children: Vec<Node> },
	Paragraph(Vec<Node>),
	Link(Link),
	Code(CodeBlock),
	/// Content of an inline code span, without the backticks.
	InlineCode(String),
	/// Raw embedded markup, as written in the source.
	Html(String),
	Table(Vec<Node>),
	/// Prose, as written in the source (escapes included).
	Text(String),
	/// Any other node with children: lists, block quotes, emphasis, table
	/// rows and cells.
	Container(Vec<Node>),
	/// A leaf no pass looks into: thematic breaks, line breaks, math,
	/// reference-style images.
	Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
	/// `[label](url)`
	Inline,
	/// `![alt](url)`
	Image,
	/// `[label]: url`
	Definition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
	pub kind: LinkKind,
	pub url: String,
	pub title: Option<String>,
	/// Alt text for images, the label for definitions. Empty for inline
	/// links, whose label lives in `children`.
	pub label: String,
	pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
	pub lang: Option<String>,
	pub meta: Option<String>,
	pub value: String,
	/// Opening fence as written, e.g. "```" or "~~~~".
	pub fence: String,
	/// Source text between the start of the block's first line and the
	/// fence: indentation or container markers repeated on every line.
	pub prefix: String,
	/// False for indented code blocks, which are re-rendered as fenced ones.
	pub fenced: bool,
}

impl Document {
	/// Parse a markdown body with GitHub-flavored extensions enabled.
	pub fn parse(source: &str) -> Result<Self, TransformError> {
		let root = to_mdast(source, &ParseOptions::gfm())
			.map_err(|e| TransformError::Parse(e.to_string()))?;
		let children = match root.children() {
			Some(children) => convert_all(children, source)?,
			None => Vec::new(),
		};

		Ok(Self {
			source: source.to_string(),
			children,
			suffix: String::new(),
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Visit every node depth-first in document order.
	pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
		for child in &mut self.children {
			child.walk_mut(visit);
		}
	}

	/// Visit every node depth-first in document order.
	pub fn walk(&self, visit: &mut impl FnMut(&Node)) {
		for child in &self.children {
			child.walk(visit);
		}
	}

	/// Serialize the tree back to text.
	pub fn render(&self) -> String {
		let mut out = String::with_capacity(self.source.len() + self.suffix.len());
		match (self.children.first(), self.children.last()) {
			(Some(first), Some(last)) => {
				out.push_str(gap(&self.source, 0, first.span.start));
				render_sequence(&self.source, &self.children, &mut out);
				out.push_str(gap(&self.source, last.span.end, self.source.len()));
			}
			_ => out.push_str(&self.source),
		}
		out.push_str(&self.suffix);
		out
	}
}

impl Node {
	pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
		visit(self);
		if let Some(children) = self.kind.children_mut() {
			for child in children {
				child.walk_mut(visit);
			}
		}
	}

	pub fn walk(&self, visit: &mut impl FnMut(&Node)) {
		visit(self);
		if let Some(children) = self.kind.children() {
			for child in children {
				child.walk(visit);
			}
		}
	}

	/// Replace the text of a `Text` or `Html` node. Other kinds are left
	/// alone.
	pub fn set_text(&mut self, text: String) {
		if let NodeKind::Text(value) | NodeKind::Html(value) = &mut self.kind {
			if *value != text {
				*value = text;
				self.touched = true;
			}
		}
	}

	fn render_into(&self, source: &str, out: &mut String) {
		match &self.kind {
			NodeKind::Text(value) | NodeKind::Html(value) => out.push_str(value),
			NodeKind::InlineCode(value) if self.touched => render_inline_code(value, out),
			NodeKind::Code(code) if self.touched => code.render_into(out),
			NodeKind::Link(link) if self.touched => link.render_into(source, out),
			NodeKind::Raw | NodeKind::InlineCode(_) | NodeKind::Code(_) => {
				out.push_str(gap(source, self.span.start, self.span.end));
			}
			NodeKind::Heading { children, .. }
			| NodeKind::Paragraph(children)
			| NodeKind::Table(children)
			| NodeKind::Container(children)
			| NodeKind::Link(Link { children, .. }) => {
				let (Some(first), Some(last)) = (children.first(), children.last()) else {
					out.push_str(gap(source, self.span.start, self.span.end));
					return;
				};
				out.push_str(gap(source, self.span.start, first.span.start));
				render_sequence(source, children, out);
				out.push_str(gap(source, last.span.end, self.span.end));
			}
		}
	}
}

impl NodeKind {
	pub fn children(&self) -> Option<&Vec<Node>> {
		match self {
			Self::Heading { children, .. }
			| Self::Paragraph(children)
			| Self::Table(children)
			| Self::Container(children)
			| Self::Link(Link { children, .. }) => Some(children),
			Self::Code(_) | Self::InlineCode(_) | Self::Html(_) | Self::Text(_) | Self::Raw => None,
		}
	}

	pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
		match self {
			Self::Heading { children, .. }
			| Self::Paragraph(children)
			| Self::Table(children)
			| Self::Container(children)
			| Self::Link(Link { children, .. }) => Some(children),
			Self::Code(_) | Self::InlineCode(_) | Self::Html(_) | Self::Text(_) | Self::Raw => None,
		}
	}
}

impl Link {
	fn render_into(&self, source: &str, out: &mut String) {
		match self.kind {
			LinkKind::Inline => {
				out.push('[');
				render_sequence(source, &self.children, out);
				out.push_str("](");
			}
			LinkKind::Image => {
				out.push_str("![");
				out.push_str(&self.label);
				out.push_str("](");
			}
			LinkKind::Definition => {
				out.push('[');
				out.push_str(&self.label);
				out.push_str("]: ");
			}
		}

		out.push_str(&destination(&self.url));
		if let Some(title) = &self.title {
			out.push_str(" \"");
			out.push_str(&title.replace('"', "\\\""));
			out.push('"');
		}

		if self.kind != LinkKind::Definition {
			out.push(')');
		}
	}
}

impl CodeBlock {
	/// The opening fence widened past any fence-like run in the content.
	fn effective_fence(&self) -> String {
		let fence = if self.fenced { self.fence.as_str() } else { "```" };
		let marker = fence.chars().next().unwrap_or('`');
		let longest = self
			.value
			.lines()
			.map(|line| line.trim_start().chars().take_while(|c| *c == marker).count())
			.max()
			.unwrap_or(0);
		let length = fence.chars().count().max(longest + 1).max(3);

		std::iter::repeat_n(marker, length).collect()
	}

	fn render_into(&self, out: &mut String) {
		let fence = self.effective_fence();
		out.push_str(&fence);
		if let Some(lang) = &self.lang {
			out.push_str(lang);
		}
		if let Some(meta) = self.meta.as_deref().filter(|meta| !meta.is_empty()) {
			out.push(' ');
			out.push_str(meta);
		}
		out.push('\n');

		if !self.value.is_empty() {
			for line in self.value.split('\n') {
				if line.is_empty() {
					out.push_str(self.prefix.trim_end());
				} else {
					out.push_str(&self.prefix);
					out.push_str(line);
				}
				out.push('\n');
			}
		}

		out.push_str(&self.prefix);
		out.push_str(&fence);
	}
}

fn render_inline_code(value: &str, out: &mut String) {
	let mut longest = 0;
	let mut run = 0;
	for c in value.chars() {
		if c == '`' {
			run += 1;
			longest = longest.max(run);
		} else {
			run = 0;
		}
	}

	let ticks = "`".repeat(longest + 1);
	let pad = value.starts_with('`') || value.ends_with('`');
	out.push_str(&ticks);
	if pad {
		out.push(' ');
	}
	out.push_str(value);
	if pad {
		out.push(' ');
	}
	out.push_str(&ticks);
}

fn destination(url: &str) -> String {
	if url.is_empty() || url.contains(char::is_whitespace) || url.contains(['(', ')']) {
		format!("<{url}>")
	} else {
		url.to_string()
	}
}

fn gap(source: &str, start: usize, end: usize) -> &str {
	if start >= end {
		return "";
	}

	source.get(start..end).unwrap_or_default()
}

/// Render sibling nodes with the source text between them.
fn render_sequence(source: &str, nodes: &[Node], out: &mut String) {
	let mut previous_end: Option<usize> = None;
	for node in nodes {
		if let Some(end) = previous_end {
			out.push_str(gap(source, end, node.span.start));
		}
		node.render_into(source, out);
		previous_end = Some(node.span.end);
	}
}

fn convert_all(nodes: &[mdast::Node], source: &str) -> Result<Vec<Node>, TransformError> {
	nodes.iter().map(|node| convert(node, source)).collect()
}

fn convert(node: &mdast::Node, source: &str) -> Result<Node, TransformError> {
	let position = node.position().ok_or(TransformError::MissingPosition)?;
	let span = position.start.offset..position.end.offset;
	let raw = || gap(source, span.start, span.end).to_string();

	let kind = match node {
		mdast::Node::Heading(heading) => NodeKind::Heading {
			depth: heading.depth,
			children: convert_all(&heading.children, source)?,
		},
		mdast::Node::Paragraph(paragraph) => {
			NodeKind::Paragraph(convert_all(&paragraph.children, source)?)
		}
		mdast::Node::Table(table) => NodeKind::Table(convert_all(&table.children, source)?),
		mdast::Node::Link(link) => NodeKind::Link(Link {
			kind: LinkKind::Inline,
			url: link.url.clone(),
			title: link.title.clone(),
			label: String::new(),
			children: convert_all(&link.children, source)?,
		}),
		mdast::Node::Image(image) => NodeKind::Link(Link {
			kind: LinkKind::Image,
			url: image.url.clone(),
			title: image.title.clone(),
			label: image.alt.clone(),
			children: Vec::new(),
		}),
		mdast::Node::Definition(definition) => NodeKind::Link(Link {
			kind: LinkKind::Definition,
			url: definition.url.clone(),
			title: definition.title.clone(),
			label: definition
				.label
				.clone()
				.unwrap_or_else(|| definition.identifier.clone()),
			children: Vec::new(),
		}),
		mdast::Node::Code(code) => NodeKind::Code(code_block(code, source, span.start)),
		mdast::Node::InlineCode(code) => NodeKind::InlineCode(code.value.clone()),
		mdast::Node::Html(_) => NodeKind::Html(raw()),
		mdast::Node::Text(_) => NodeKind::Text(raw()),
		other => match other.children() {
			Some(children) => NodeKind::Container(convert_all(children, source)?),
			None => NodeKind::Raw,
		},
	};

	Ok(Node {
		span,
		line: position.start.line,
		kind,
		touched: false,
	})
}

fn code_block(code: &mdast::Code, source: &str, start: usize) -> CodeBlock {
	let line_start = source[..start].rfind('\n').map_or(0, |index| index + 1);
	let prefix = source[line_start..start].to_string();
	let opening = source[start..].trim_start_matches([' ', '\t']);
	let fence_length = opening
		.chars()
		.take_while(|c| *c == '`' || *c == '~')
		.count();
	let fenced = fence_length >= 3;

	CodeBlock {
		lang: code.lang.clone(),
		meta: code.meta.clone(),
		value: code.value.clone(),
		fence: if fenced {
			opening[..fence_length].to_string()
		} else {
			"```".to_string()
		},
		prefix,
		fenced,
	}
}
