use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;

use crate::issues::DocumentIssue;
use crate::paths::is_asset_path;
use crate::paths::normalize_segments;
use crate::paths::normalized_asset_path;
use crate::paths::normalized_route;
use crate::paths::parent_segments;
use crate::paths::version_label;
use crate::tree::Document;
use crate::tree::NodeKind;

static SCHEME_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid scheme regex"));

/// Segments that name a version even when the version list does not know
/// them.
static VERSION_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(?:version-)?(?:v?\d+(?:\.\d+)*|latest|next|current)$")
		.expect("valid version regex")
});

/// `href`/`src` attributes inside raw markup.
pub(crate) static ATTRIBUTE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(\b(?:href|src)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
		.expect("valid attribute link regex")
});

/// Where the document being transformed lives.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
	pub product: &'a str,
	pub version: &'a str,
	/// Every version label in the run.
	pub known_versions: &'a [String],
	/// Version-relative path of the source document.
	pub source_path: &'a str,
	pub assets_dir: &'a str,
}

/// A link target after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
	pub url: String,
	/// The target was relative, so the result depends on the source path.
	pub relative: bool,
	/// The url was namespaced under the version being migrated, so the result
	/// depends on that version.
	pub current_version: bool,
	/// `..` climbed above the version root and was clamped.
	pub escaped_root: bool,
}

impl LinkContext<'_> {
	fn is_version_segment(&self, segment: &str) -> bool {
		self.is_known_version(segment) || VERSION_SEGMENT_RE.is_match(segment)
	}

	fn is_known_version(&self, segment: &str) -> bool {
		let label = version_label(segment);
		self.known_versions.iter().any(|version| version == label)
	}

	fn namespaced(&self, version: &str, route: &str, suffix: &str) -> String {
		if route.is_empty() {
			format!("/{}/{version}{suffix}", self.product)
		} else {
			format!("/{}/{version}/{route}{suffix}", self.product)
		}
	}
}

/// Resolve one link target. Returns `None` for targets that are left
/// unchanged: external addresses, protocol-relative urls, same-page anchors
/// and absolute asset paths.
///
/// The steps run in a fixed order: resolve relative to the source document's
/// directory, strip ordering prefixes, strip the document extension, then add
/// the `/<product>/<version>` namespace.
pub fn resolve_target(target: &str, context: &LinkContext<'_>) -> Option<ResolvedLink> {
	let target = target.trim();
	if target.is_empty()
		|| target.starts_with('#')
		|| target.starts_with("//")
		|| SCHEME_RE.is_match(target)
	{
		return None;
	}

	let split = target.find(['#', '?']).unwrap_or(target.len());
	let (path, suffix) = target.split_at(split);
	if path.is_empty() {
		return None;
	}

	if !path.starts_with('/') {
		let normalized = normalize_segments(parent_segments(context.source_path), path);
		let joined = normalized.segments.join("/");
		let asset = is_asset_path(path);
		let url = if asset {
			format!("/{}/{}{suffix}", context.assets_dir, normalized_asset_path(&joined))
		} else {
			context.namespaced(context.version, &normalized_route(&joined), suffix)
		};

		return Some(ResolvedLink {
			url,
			relative: true,
			current_version: !asset,
			escaped_root: normalized.escaped_root,
		});
	}

	if is_asset_path(path) {
		return None;
	}

	let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
	let (version, rest) = match segments.as_slice() {
		[first, version, rest @ ..]
			if *first == context.product && context.is_version_segment(version) =>
		{
			if context.is_known_version(version) {
				(Some(version_label(version)), rest)
			} else {
				(None, rest)
			}
		}
		[first, rest @ ..] if *first == context.product => (None, rest),
		all => (None, all),
	};
	let url = context.namespaced(
		version.unwrap_or(context.version),
		&normalized_route(&rest.join("/")),
		suffix,
	);

	Some(ResolvedLink {
		url,
		relative: false,
		current_version: version.is_none(),
		escaped_root: false,
	})
}

/// What the resolved links of one document depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkDependencies {
	/// Some target was relative to the source path.
	pub location_sensitive: bool,
	/// Some url took the version being migrated.
	pub version_sensitive: bool,
}

/// Link resolution pass over a parsed document. Rewrites markdown links,
/// images, definitions and `href`/`src` attributes in raw markup.
pub fn resolve_links(
	document: &mut Document,
	context: &LinkContext<'_>,
	issues: &mut Vec<DocumentIssue>,
) -> LinkDependencies {
	let mut dependencies = LinkDependencies::default();

	let mut report = |resolved: &ResolvedLink, target: &str, line: usize| {
		dependencies.location_sensitive |= resolved.relative;
		dependencies.version_sensitive |= resolved.current_version;
		if resolved.escaped_root {
			issues.push(
				DocumentIssue::warning(format!(
					"link `{target}` points above the version root and was clamped to `{}`",
					resolved.url
				))
				.at_line(line)
				.with_suggestion("check the number of `../` segments in the link"),
			);
		}
	};

	document.walk_mut(&mut |node| {
		let line = node.line;
		match &mut node.kind {
			NodeKind::Link(link) => {
				if let Some(resolved) = resolve_target(&link.url, context) {
					report(&resolved, &link.url, line);
					if resolved.url != link.url {
						link.url = resolved.url;
						node.touched = true;
					}
				}
			}
			NodeKind::Html(html) => {
				let mut changed = false;
				let rewritten = ATTRIBUTE_LINK_RE.replace_all(html, |caps: &Captures<'_>| {
					let (value, quote) = match (caps.get(2), caps.get(3)) {
						(Some(value), _) => (value.as_str(), '"'),
						(None, Some(value)) => (value.as_str(), '\''),
						(None, None) => return caps[0].to_string(),
					};
					let Some(resolved) = resolve_target(value, context) else {
						return caps[0].to_string();
					};
					report(&resolved, value, line);
					changed |= resolved.url != value;
					format!("{}{quote}{}{quote}", &caps[1], resolved.url)
				});
				if changed {
					*html = rewritten.into_owned();
					node.touched = true;
				}
			}
			_ => {}
		}
	});

	dependencies
}
