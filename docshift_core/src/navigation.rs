//! Builds the navigation tree from the flat list of migrated pages.
//!
//! Pages are grouped by their source directory. Inside a directory, pages
//! and sub-groups are ordered by ordering hint with ties broken by path, and
//! every item gets a distinct position (see [`assign_positions`]).

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::paths::parent_segments;
use crate::paths::title_case;

/// One migrated page as seen by the navigation builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
	/// Source path relative to the version root. Decides grouping and breaks
	/// ordering ties.
	pub source_path: String,
	/// Migrated route relative to the version root.
	pub route: String,
	pub ordering: Option<i64>,
}

/// Label and position of a directory, read from `_category_.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMeta {
	pub label: Option<String>,
	pub position: Option<i64>,
}

#[derive(Deserialize)]
struct CategoryFile {
	#[serde(default)]
	label: Option<String>,
	#[serde(default)]
	position: Option<f64>,
}

impl CategoryMeta {
	pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
		let file: CategoryFile = serde_json::from_str(json)?;
		Ok(Self {
			label: file
				.label
				.map(|label| label.trim().to_string())
				.filter(|label| !label.is_empty()),
			position: file.position.map(|position| position.floor() as i64),
		})
	}
}

/// A page reference or a labeled group of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NavigationNode {
	/// `<product>/<version>/<route>`
	Page(String),
	Group {
		group: String,
		pages: Vec<NavigationNode>,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionNavigation {
	pub version: String,
	pub pages: Vec<NavigationNode>,
}

/// The navigation fragment written to `navigation.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
	pub versions: Vec<VersionNavigation>,
}

impl Navigation {
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string_pretty(self)
	}
}

/// Order items by hint (items without one last), then by path, and give
/// each a position. An explicit hint is kept unless an earlier item already
/// took it, in which case the next free position is used, so hints
/// `[1, 1, 2]` become positions `1, 2, 3`.
///
/// Hints are capped so that every item still gets a distinct position below
/// `i64::MAX`.
///
/// Returns `(index into items, position)` in navigation order.
pub fn assign_positions(items: &[(Option<i64>, &str)]) -> Vec<(usize, i64)> {
	let ceiling = i64::MAX - i64::try_from(items.len()).unwrap_or(i64::MAX);
	let mut order: Vec<usize> = (0..items.len()).collect();
	order.sort_by(|a, b| {
		let (hint_a, path_a) = items[*a];
		let (hint_b, path_b) = items[*b];
		(hint_a.is_none(), hint_a, path_a).cmp(&(hint_b.is_none(), hint_b, path_b))
	});

	let mut last: Option<i64> = None;
	order
		.into_iter()
		.map(|index| {
			let next = last.map_or(1, |last| last.saturating_add(1));
			let position = match items[index].0.map(|hint| hint.min(ceiling)) {
				Some(hint) if last.is_none() => hint,
				Some(hint) => hint.max(next),
				None => next,
			};
			last = Some(position);
			(index, position)
		})
		.collect()
}

/// Build the navigation for one version. `categories` is keyed by source
/// directory path relative to the version root.
pub fn build_version_navigation(
	product: &str,
	version: &str,
	entries: &[NavEntry],
	categories: &BTreeMap<String, CategoryMeta>,
) -> VersionNavigation {
	VersionNavigation {
		version: version.to_string(),
		pages: build_directory("", product, version, entries, categories),
	}
}

enum Item<'a> {
	Page(&'a NavEntry),
	Directory(String),
}

fn build_directory(
	directory: &str,
	product: &str,
	version: &str,
	entries: &[NavEntry],
	categories: &BTreeMap<String, CategoryMeta>,
) -> Vec<NavigationNode> {
	let mut items: Vec<(Option<i64>, String, Item<'_>)> = Vec::new();
	let mut subdirectories: BTreeSet<String> = BTreeSet::new();

	for entry in entries {
		let parents = parent_segments(&entry.source_path).join("/");
		if parents == directory {
			items.push((entry.ordering, entry.source_path.clone(), Item::Page(entry)));
			continue;
		}

		let Some(rest) = child_path(&parents, directory) else {
			continue;
		};
		let child = rest.split('/').next().unwrap_or(rest);
		let child = if directory.is_empty() {
			child.to_string()
		} else {
			format!("{directory}/{child}")
		};
		subdirectories.insert(child);
	}

	for subdirectory in subdirectories {
		let position = categories.get(&subdirectory).and_then(|meta| meta.position);
		items.push((position, subdirectory.clone(), Item::Directory(subdirectory)));
	}

	let keys: Vec<(Option<i64>, &str)> = items
		.iter()
		.map(|(hint, path, _)| (*hint, path.as_str()))
		.collect();
	let order = assign_positions(&keys);

	let mut nodes = Vec::with_capacity(order.len());
	for (index, _) in order {
		match &items[index].2 {
			Item::Page(entry) => {
				nodes.push(NavigationNode::Page(format!("{product}/{version}/{}", entry.route)));
			}
			Item::Directory(path) => {
				let pages = build_directory(path, product, version, entries, categories);
				if pages.is_empty() {
					continue;
				}
				let name = path.rsplit('/').next().unwrap_or(path);
				let group = categories
					.get(path)
					.and_then(|meta| meta.label.clone())
					.unwrap_or_else(|| title_case(name));
				nodes.push(NavigationNode::Group { group, pages });
			}
		}
	}

	nodes
}

/// The part of `path` below `directory`, if `path` is inside it.
fn child_path<'a>(path: &'a str, directory: &str) -> Option<&'a str> {
	if path.is_empty() {
		return None;
	}
	if directory.is_empty() {
		return Some(path);
	}

	path.strip_prefix(directory)?.strip_prefix('/')
}
