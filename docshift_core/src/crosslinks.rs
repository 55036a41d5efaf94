use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::LazyLock;

use derive_more::Deref;
use regex::Captures;
use regex::Regex;

use crate::links::ATTRIBUTE_LINK_RE;
use crate::protect;

static INLINE_TARGET_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(\]\()(<?)([^)\s>]+)").expect("valid inline target regex"));

static DEFINITION_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?m)^([ \t]*\[[^\]\n]+\]:[ \t]*)(<?)([^\s>]+)").expect("valid definition regex")
});

/// Two source files that migrate to the same route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConflict {
	/// The shared migrated route.
	pub migrated: String,
	/// Source file that claimed the route first.
	pub first: String,
	/// Source file that was rejected.
	pub second: String,
}

/// Relation from each document's normalized original route to its migrated
/// route, both namespaced as `/<product>/<version>/<route>`.
#[derive(Debug, Clone, Default, Deref)]
pub struct PathMapping {
	#[deref]
	routes: BTreeMap<String, String>,
	/// Migrated route to the source file that claimed it.
	claimed: HashMap<String, String>,
}

impl PathMapping {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `original -> migrated` for `source_file`. Fails when another
	/// source file already maps to the same original or migrated route.
	pub fn insert(
		&mut self,
		original: impl Into<String>,
		migrated: impl Into<String>,
		source_file: impl Into<String>,
	) -> Result<(), MappingConflict> {
		let original = original.into();
		let migrated = migrated.into();
		let source_file = source_file.into();

		let existing = self
			.claimed
			.get(&migrated)
			.or_else(|| {
				self.routes
					.get(&original)
					.and_then(|target| self.claimed.get(target))
			})
			.cloned();
		if let Some(first) = existing {
			return Err(MappingConflict {
				migrated,
				first,
				second: source_file,
			});
		}

		self.claimed.insert(migrated.clone(), source_file);
		self.routes.insert(original, migrated);
		Ok(())
	}

	/// The migrated path for `path` when it names a mapped page exactly. A
	/// trailing `/` is ignored. Pages below a renamed page's route are not
	/// moved with it, and mappings to themselves are ignored.
	pub fn rewrite(&self, path: &str) -> Option<String> {
		let page = match path.trim_end_matches('/') {
			"" => path,
			trimmed => trimmed,
		};
		let target = self.routes.get(page)?;
		(target != page).then(|| target.clone())
	}

	fn rewrite_target(&self, target: &str) -> Option<String> {
		let split = target.find(['#', '?']).unwrap_or(target.len());
		let (path, suffix) = target.split_at(split);
		self.rewrite(path).map(|path| format!("{path}{suffix}"))
	}
}

/// Rewrite every link, definition and `href`/`src` attribute in `text` whose
/// target has a mapping. Code is never touched. Returns the new text and the
/// number of rewritten targets.
pub fn rewrite_links(text: &str, mapping: &PathMapping) -> (String, usize) {
	if mapping.is_empty() {
		return (text.to_string(), 0);
	}

	let mut count = 0;
	let output = protect::apply(text, |text| {
		let text = INLINE_TARGET_RE.replace_all(text, |caps: &Captures<'_>| {
			match mapping.rewrite_target(&caps[3]) {
				Some(target) => {
					count += 1;
					format!("{}{}{target}", &caps[1], &caps[2])
				}
				None => caps[0].to_string(),
			}
		});

		let text = DEFINITION_TARGET_RE.replace_all(&text, |caps: &Captures<'_>| {
			match mapping.rewrite_target(&caps[3]) {
				Some(target) => {
					count += 1;
					format!("{}{}{target}", &caps[1], &caps[2])
				}
				None => caps[0].to_string(),
			}
		});

		ATTRIBUTE_LINK_RE
			.replace_all(&text, |caps: &Captures<'_>| {
				let (value, quote) = match (caps.get(2), caps.get(3)) {
					(Some(value), _) => (value.as_str(), '"'),
					(None, Some(value)) => (value.as_str(), '\''),
					(None, None) => return caps[0].to_string(),
				};
				match mapping.rewrite_target(value) {
					Some(target) => {
						count += 1;
						format!("{}{quote}{target}{quote}", &caps[1])
					}
					None => caps[0].to_string(),
				}
			})
			.into_owned()
	});

	(output, count)
}
