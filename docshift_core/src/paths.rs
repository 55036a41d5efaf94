//! Path normalization shared by the walker, the link passes and the
//! navigation builder. Every place that turns a source path into a route goes
//! through [`strip_ordering_prefix`] so files and links always agree.

use std::path::Path;

/// Extensions treated as documents.
pub const DOCUMENT_EXTENSIONS: [&str; 3] = ["md", "mdx", "markdown"];

/// Extensions treated as assets that are copied to the shared asset
/// directory.
pub const ASSET_EXTENSIONS: [&str; 10] = [
	"png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "pdf", "mp4",
];

/// Strip a numeric ordering prefix such as `01-` or `2_` from one path
/// segment. A segment made only of the prefix is left alone.
pub fn strip_ordering_prefix(segment: &str) -> &str {
	let digits = segment.bytes().take_while(u8::is_ascii_digit).count();
	if digits == 0 {
		return segment;
	}

	let rest = &segment[digits..];
	match rest.strip_prefix(['-', '_']) {
		Some(stripped) if !stripped.is_empty() => stripped,
		_ => segment,
	}
}

/// Strip a document extension (`.md`, `.mdx`, `.markdown`) from a path or
/// segment.
pub fn strip_document_extension(path: &str) -> &str {
	for ext in DOCUMENT_EXTENSIONS {
		if let Some(stem) = path.strip_suffix(ext).and_then(|s| s.strip_suffix('.')) {
			if !stem.is_empty() && !stem.ends_with('/') {
				return stem;
			}
		}
	}

	path
}

fn extension_of(path: &str) -> Option<String> {
	let name = path.rsplit('/').next().unwrap_or(path);
	let (stem, ext) = name.rsplit_once('.')?;
	if stem.is_empty() {
		return None;
	}

	Some(ext.to_ascii_lowercase())
}

pub fn is_document_path(path: &str) -> bool {
	extension_of(path).is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_asset_path(path: &str) -> bool {
	extension_of(path).is_some_and(|ext| ASSET_EXTENSIONS.contains(&ext.as_str()))
}

/// Convert a relative file system path into a forward-slash string.
pub fn to_slash(path: &Path) -> String {
	path.components()
		.map(|component| component.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/")
}

/// Result of resolving `.` and `..` segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSegments {
	pub segments: Vec<String>,
	/// `..` tried to climb above the root; the extra segments were dropped.
	pub escaped_root: bool,
}

/// Join `target` onto `base` and fold away `.`, `..` and empty segments.
pub fn normalize_segments<'a>(
	base: impl IntoIterator<Item = &'a str>,
	target: &'a str,
) -> NormalizedSegments {
	let mut segments: Vec<String> = Vec::new();
	let mut escaped_root = false;

	for segment in base.into_iter().chain(target.split('/')) {
		match segment {
			"" | "." => {}
			".." => {
				if segments.pop().is_none() {
					escaped_root = true;
				}
			}
			other => segments.push(other.to_string()),
		}
	}

	NormalizedSegments {
		segments,
		escaped_root,
	}
}

/// Directory segments of a slash-separated relative file path.
pub fn parent_segments(path: &str) -> Vec<&str> {
	let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
	segments.pop();
	segments
}

/// The route a source file maps to before any front matter renames:
/// ordering prefixes stripped from every segment and the extension dropped.
///
/// `02-guides/01-start.md` becomes `guides/start`.
pub fn normalized_route(relative_path: &str) -> String {
	let stem = strip_document_extension(relative_path);
	stem.split('/')
		.filter(|segment| !segment.is_empty())
		.map(strip_ordering_prefix)
		.collect::<Vec<_>>()
		.join("/")
}

/// Like [`normalized_route`] but keeps the file extension. Used for assets.
pub fn normalized_asset_path(relative_path: &str) -> String {
	relative_path
		.split('/')
		.filter(|segment| !segment.is_empty())
		.map(strip_ordering_prefix)
		.collect::<Vec<_>>()
		.join("/")
}

/// Turn a file or directory name into a human label: ordering prefix and
/// extension removed, separators replaced with spaces, words title-cased.
///
/// `02-getting_started.md` becomes `Getting Started`.
pub fn title_case(name: &str) -> String {
	let name = strip_ordering_prefix(strip_document_extension(name));
	name.split(['-', '_', ' '])
		.filter(|word| !word.is_empty())
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Version label for a version directory name. A Docusaurus `version-`
/// prefix is dropped.
pub fn version_label(directory_name: &str) -> &str {
	match directory_name.strip_prefix("version-") {
		Some(label) if !label.is_empty() => label,
		_ => directory_name,
	}
}
