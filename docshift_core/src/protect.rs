//! Shields code from text-level rewriting.
//!
//! [`apply`] swaps every fenced code block and inline code span for an opaque
//! placeholder, runs a transform over what is left and then puts the code
//! back. The transform never sees code bytes, so it cannot change them.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"@@PROTECTED_(\d+)@@").expect("valid placeholder regex"));

/// Matches placeholders after a transform escaped some of their characters.
static ESCAPED_PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\\?@\\?@PROTECTED\\?_(\d+)\\?@\\?@").expect("valid escaped placeholder regex")
});

fn placeholder(index: usize) -> String {
	format!("@@PROTECTED_{index}@@")
}

/// Text with its code regions replaced by placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
	pub text: String,
	regions: Vec<String>,
	/// Byte offset of each placeholder in `text`.
	offsets: Vec<usize>,
}

impl ProtectedText {
	/// Number of protected regions.
	pub fn len(&self) -> usize {
		self.regions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.regions.is_empty()
	}

	/// Map a 1-indexed line of `text` back to the line it had before code
	/// regions spanning several lines were collapsed into placeholders.
	pub fn original_line(&self, line: usize) -> usize {
		let mut hidden = 0;
		for (offset, region) in self.offsets.iter().zip(&self.regions) {
			let placeholder_line = 1 + self.text[..*offset].matches('\n').count();
			if placeholder_line >= line {
				break;
			}
			hidden += region.matches('\n').count();
		}

		line + hidden
	}

	/// Put the protected regions back into `text`.
	pub fn restore(&self, text: &str) -> String {
		let lookup = |caps: &Captures<'_>| {
			caps[1]
				.parse::<usize>()
				.ok()
				.and_then(|index| self.regions.get(index))
				.cloned()
				.unwrap_or_else(|| caps[0].to_string())
		};

		let restored = PLACEHOLDER_RE.replace_all(text, lookup);
		ESCAPED_PLACEHOLDER_RE
			.replace_all(&restored, lookup)
			.into_owned()
	}
}

/// Run `transform` over `text` with every code region hidden.
pub fn apply(text: &str, transform: impl FnOnce(&str) -> String) -> String {
	let protected = protect(text);
	if protected.is_empty() {
		return transform(text);
	}

	let transformed = transform(&protected.text);
	protected.restore(&transformed)
}

/// Replace every code region with a placeholder.
pub fn protect(text: &str) -> ProtectedText {
	let ranges = code_regions(text);
	let mut out = String::with_capacity(text.len());
	let mut regions = Vec::with_capacity(ranges.len());
	let mut offsets = Vec::with_capacity(ranges.len());
	let mut cursor = 0;

	for range in ranges {
		out.push_str(&text[cursor..range.start]);
		offsets.push(out.len());
		out.push_str(&placeholder(regions.len()));
		regions.push(text[range.clone()].to_string());
		cursor = range.end;
	}
	out.push_str(&text[cursor..]);

	ProtectedText {
		text: out,
		regions,
		offsets,
	}
}

/// The fence character and length when `line` (with indentation removed)
/// opens or closes a fenced block.
fn fence_marker(line: &str) -> Option<(u8, usize)> {
	let first = *line.as_bytes().first()?;
	if first != b'`' && first != b'~' {
		return None;
	}

	let length = line.bytes().take_while(|b| *b == first).count();
	(length >= 3).then_some((first, length))
}

/// Byte ranges of fenced code blocks and inline code spans, in order and
/// non-overlapping.
///
/// A fence may be indented and closes on a line of the same character at
/// least as long as the opener. An unclosed fence runs to the end of the
/// text. Inline spans close on a backtick run of exactly the opening length.
pub fn code_regions(text: &str) -> Vec<Range<usize>> {
	let mut regions = Vec::new();
	let mut fence: Option<(u8, usize, usize)> = None;
	let mut prose_start = 0;
	let mut offset = 0;

	for line in text.split_inclusive('\n') {
		let line_start = offset;
		offset += line.len();
		let trimmed = line.trim_start_matches([' ', '\t']);

		match fence {
			None => {
				if let Some((marker, length)) = fence_marker(trimmed) {
					inline_regions(text, prose_start..line_start, &mut regions);
					fence = Some((marker, length, line_start));
				}
			}
			Some((marker, length, start)) => {
				let closes = fence_marker(trimmed).is_some_and(|(m, l)| {
					m == marker && l >= length && trimmed[l..].trim().is_empty()
				});
				if closes {
					// the trailing newline stays outside the region
					let end = if line.ends_with('\n') { offset - 1 } else { offset };
					regions.push(start..end);
					fence = None;
					prose_start = end;
				}
			}
		}
	}

	match fence {
		Some((_, _, start)) => regions.push(start..text.len()),
		None => inline_regions(text, prose_start..text.len(), &mut regions),
	}

	regions
}

fn inline_regions(text: &str, range: Range<usize>, regions: &mut Vec<Range<usize>>) {
	let bytes = text.as_bytes();
	let mut index = range.start;

	while index < range.end {
		if bytes[index] != b'`' {
			index += 1;
			continue;
		}

		let start = index;
		while index < range.end && bytes[index] == b'`' {
			index += 1;
		}
		let length = index - start;

		if start > 0 && bytes[start - 1] == b'\\' {
			continue;
		}

		if let Some(end) = find_closing_run(bytes, index, range.end, length) {
			regions.push(start..end);
			index = end;
		}
	}
}

/// Find a backtick run of exactly `length` in `bytes[from..to]` and return
/// the offset just past it.
fn find_closing_run(bytes: &[u8], from: usize, to: usize, length: usize) -> Option<usize> {
	let mut index = from;
	while index < to {
		if bytes[index] != b'`' {
			index += 1;
			continue;
		}

		let start = index;
		while index < to && bytes[index] == b'`' {
			index += 1;
		}
		if index - start == length {
			return Some(index);
		}
	}

	None
}
