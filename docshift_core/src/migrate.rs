use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::DocshiftError;
use crate::DocshiftResult;
use crate::cache::CacheEntry;
use crate::cache::ContentCache;
use crate::cache::ContentHash;
use crate::codeblocks::HttpFetcher;
use crate::codeblocks::OfflineFetcher;
use crate::codeblocks::ReferenceFetcher;
use crate::config::MigrationOptions;
use crate::crosslinks::PathMapping;
use crate::crosslinks::rewrite_links;
use crate::frontmatter::DocumentMeta;
use crate::issues::DocumentIssue;
use crate::issues::IssueReporter;
use crate::issues::MigrationIssue;
use crate::navigation::CategoryMeta;
use crate::navigation::NavEntry;
use crate::navigation::Navigation;
use crate::navigation::build_version_navigation;
use crate::paths::is_asset_path;
use crate::paths::is_document_path;
use crate::paths::normalized_asset_path;
use crate::paths::normalized_route;
use crate::paths::parent_segments;
use crate::paths::to_slash;
use crate::paths::version_label;
use crate::transform::SourceDocument;
use crate::transform::Transformer;

/// File name of the navigation fragment written to the output root.
pub const NAVIGATION_FILE: &str = "navigation.json";

/// Per-directory metadata file of the source tree.
pub const CATEGORY_FILE: &str = "_category_.json";

/// Extension of every migrated document.
pub const OUTPUT_EXTENSION: &str = "mdx";

/// One version directory of the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDir {
	pub directory: PathBuf,
	/// Directory name with any `version-` prefix removed.
	pub label: String,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
	pub versions: usize,
	/// Documents discovered.
	pub documents: usize,
	/// Documents that went through the transformer.
	pub transformed: usize,
	/// Documents whose output came from the content cache.
	pub cache_hits: usize,
	/// Documents copied through untransformed after a failure.
	pub fallbacks: usize,
	/// Documents skipped because their route was already taken.
	pub skipped: usize,
	pub links_rewritten: usize,
	pub assets_copied: usize,
	/// Files written to disk. Always zero for dry runs.
	pub written: usize,
}

/// A document after migration, kept in memory until the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedPage {
	pub version: String,
	/// Source path relative to the version root.
	pub source_path: String,
	/// Route relative to the version root.
	pub route: String,
	/// Where the page is (or, for dry runs, would be) written.
	pub output_path: PathBuf,
	pub content: String,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct MigrationSummary {
	pub output_root: PathBuf,
	pub dry_run: bool,
	pub versions: Vec<String>,
	pub stats: RunStats,
	pub pages: Vec<MigratedPage>,
	pub issues: Vec<MigrationIssue>,
	/// Human-readable issue report.
	pub report: String,
	pub navigation: Option<Navigation>,
}

impl MigrationSummary {
	pub fn has_errors(&self) -> bool {
		self.issues
			.iter()
			.any(|issue| issue.severity == crate::Severity::Error)
	}

	/// The page migrated from `source_path` in `version`.
	pub fn page(&self, version: &str, source_path: &str) -> Option<&MigratedPage> {
		self.pages
			.iter()
			.find(|page| page.version == version && page.source_path == source_path)
	}
}

/// Run a migration. Referenced code is fetched over HTTP when
/// `fetch_references` is set.
pub async fn migrate(options: &MigrationOptions) -> DocshiftResult<MigrationSummary> {
	if !options.fetch_references {
		return migrate_with_fetcher(options, &OfflineFetcher).await;
	}

	match HttpFetcher::new(options.fetch_timeout) {
		Ok(fetcher) => migrate_with_fetcher(options, &fetcher).await,
		Err(e) => {
			warn!(error = %e, "http client unavailable, referenced code will not be fetched");
			migrate_with_fetcher(options, &OfflineFetcher).await
		}
	}
}

/// Run a migration with an explicit fetcher for referenced code.
pub async fn migrate_with_fetcher<F: ReferenceFetcher>(
	options: &MigrationOptions,
	fetcher: &F,
) -> DocshiftResult<MigrationSummary> {
	Migrator::new(options, fetcher).run().await
}

/// Drives every stage over every version, one document at a time.
pub struct Migrator<'a, F> {
	options: &'a MigrationOptions,
	fetcher: &'a F,
	product: String,
	output_root: PathBuf,
	cache: ContentCache,
	reporter: IssueReporter,
	mapping: PathMapping,
	stats: RunStats,
	pages: Vec<MigratedPage>,
	/// Public asset path to the hash of the first copy.
	assets: HashMap<String, ContentHash>,
}

/// Per-version state collected during the walk.
#[derive(Default)]
struct VersionState {
	entries: Vec<NavEntry>,
	categories: BTreeMap<String, CategoryMeta>,
}

impl<'a, F: ReferenceFetcher> Migrator<'a, F> {
	pub fn new(options: &'a MigrationOptions, fetcher: &'a F) -> Self {
		Self {
			options,
			fetcher,
			product: options.product.trim().to_string(),
			output_root: options.output_root(),
			cache: ContentCache::new(),
			reporter: IssueReporter::new(),
			mapping: PathMapping::new(),
			stats: RunStats::default(),
			pages: Vec::new(),
			assets: HashMap::new(),
		}
	}

	pub async fn run(mut self) -> DocshiftResult<MigrationSummary> {
		let options = self.options;
		options.validate()?;
		check_source_root(&options.source_root).await?;
		let versions = discover_versions(options).await?;
		let labels: Vec<String> = versions.iter().map(|v| v.label.clone()).collect();
		let excludes = versions
			.iter()
			.map(|version| build_exclude_matcher(&version.directory, &options.exclude_patterns))
			.collect::<DocshiftResult<Vec<_>>>()?;

		if !options.dry_run {
			tokio::fs::create_dir_all(&self.output_root)
				.await
				.map_err(|e| DocshiftError::OutputDir {
					path: self.output_root.display().to_string(),
					reason: e.to_string(),
				})?;
		}

		info!(
			product = %self.product,
			versions = ?labels,
			output = %self.output_root.display(),
			dry_run = options.dry_run,
			"starting migration"
		);

		let mut navigation = Navigation::default();
		for (version, exclude) in versions.iter().zip(&excludes) {
			info!(version = %version.label, "migrating version");
			self.stats.versions += 1;
			let files = collect_files(&version.directory, exclude).await?;
			let mut state = VersionState::default();

			for relative in files {
				let path = version.directory.join(&relative);
				let file_name = relative.rsplit('/').next().unwrap_or(&relative);
				if file_name == CATEGORY_FILE {
					self.read_category(version, &relative, &path, &mut state).await;
				} else if is_document_path(&relative) {
					self.process_document(version, &labels, &relative, &path, &mut state)
						.await;
				} else if is_asset_path(&relative) {
					self.copy_asset(version, &relative, &path).await;
				} else {
					debug!(file = %relative, "skipping unsupported file");
				}
			}

			if options.update_navigation {
				navigation.versions.push(build_version_navigation(
					&self.product,
					&version.label,
					&state.entries,
					&state.categories,
				));
			}
		}

		self.rewrite_cross_links().await;

		let navigation = if options.update_navigation {
			self.write_navigation(&navigation).await?;
			Some(navigation)
		} else {
			None
		};

		info!(
			documents = self.stats.documents,
			transformed = self.stats.transformed,
			cache_hits = self.stats.cache_hits,
			fallbacks = self.stats.fallbacks,
			links_rewritten = self.stats.links_rewritten,
			issues = self.reporter.issues().len(),
			"migration finished"
		);

		let report = self.reporter.generate_report();
		Ok(MigrationSummary {
			output_root: self.output_root,
			dry_run: options.dry_run,
			versions: labels,
			stats: self.stats,
			pages: self.pages,
			issues: self.reporter.into_issues(),
			report,
			navigation,
		})
	}

	async fn read_category(
		&mut self,
		version: &VersionDir,
		relative: &str,
		path: &Path,
		state: &mut VersionState,
	) {
		self.reporter
			.set_current_file(format!("{}/{relative}", version.label));
		let parsed = match tokio::fs::read_to_string(path).await {
			Ok(json) => CategoryMeta::parse(&json).map_err(|e| e.to_string()),
			Err(e) => Err(e.to_string()),
		};

		match parsed {
			Ok(meta) => {
				let directory = parent_segments(relative).join("/");
				state.categories.insert(directory, meta);
			}
			Err(reason) => {
				self.reporter.record(
					DocumentIssue::warning(format!("could not read category metadata: {reason}"))
						.with_suggestion("the directory is labeled from its name instead"),
				);
			}
		}
	}

	async fn process_document(
		&mut self,
		version: &VersionDir,
		labels: &[String],
		relative: &str,
		path: &Path,
		state: &mut VersionState,
	) {
		let file = format!("{}/{relative}", version.label);
		self.reporter.set_current_file(file.clone());
		self.stats.documents += 1;
		debug!(file = %file, "discovered");

		let raw = match tokio::fs::read_to_string(path).await {
			Ok(raw) => raw,
			Err(e) => {
				self.reporter.record(
					DocumentIssue::error(format!("could not read document: {e}"))
						.with_suggestion("documents must be readable UTF-8 text"),
				);
				return;
			}
		};

		let hash = ContentHash::of(&raw);
		debug!(file = %file, hash = hash.short(), "hashed");

		let reusable = self
			.cache
			.lookup(&hash)
			.filter(|entry| entry.reusable_for(relative, &version.label))
			.map(|entry| entry.document.clone());

		let document = match reusable {
			Some(document) => {
				debug!(file = %file, "cache hit");
				self.stats.cache_hits += 1;
				document
			}
			None => {
				debug!(file = %file, "transforming");
				self.stats.transformed += 1;
				let source = SourceDocument {
					path: relative.to_string(),
					version: version.label.clone(),
					product: self.product.clone(),
					raw,
				};
				let transformer = Transformer::new(self.options, labels, self.fetcher);
				let document = match transformer.transform(&source).await {
					Ok(document) => document,
					Err(fallback) => {
						warn!(file = %file, error = %fallback.error, "copying document untransformed");
						self.stats.fallbacks += 1;
						fallback.document
					}
				};
				self.cache.store(
					hash,
					CacheEntry::new(document.clone(), version.label.clone(), relative),
				);
				document
			}
		};

		for issue in &document.issues {
			self.reporter.record(issue.clone());
		}

		let route = migrated_route(relative, &document.meta);
		let original = format!("/{}/{}/{}", self.product, version.label, normalized_route(relative));
		let migrated = format!("/{}/{}/{route}", self.product, version.label);
		if let Err(conflict) = self.mapping.insert(original, migrated, file.clone()) {
			self.stats.skipped += 1;
			self.reporter.record(
				DocumentIssue::error(format!(
					"`{}` and `{}` both migrate to `{}`; this file was skipped",
					conflict.second, conflict.first, conflict.migrated
				))
				.with_suggestion("rename one of the files or give it a distinct `slug`"),
			);
			return;
		}

		let output_path = self
			.output_root
			.join(&self.product)
			.join(&version.label)
			.join(format!("{route}.{OUTPUT_EXTENSION}"));

		if !self.options.dry_run {
			match write_file(&output_path, &document.output).await {
				Ok(()) => self.stats.written += 1,
				Err(e) => {
					self.reporter.record(DocumentIssue::error(format!(
						"could not write `{}`: {e}",
						output_path.display()
					)));
					return;
				}
			}
		}
		debug!(file = %file, output = %output_path.display(), "written");

		state.entries.push(NavEntry {
			source_path: relative.to_string(),
			route: route.clone(),
			ordering: document.meta.ordering,
		});
		self.pages.push(MigratedPage {
			version: version.label.clone(),
			source_path: relative.to_string(),
			route,
			output_path,
			content: document.output,
		});
	}

	async fn copy_asset(&mut self, version: &VersionDir, relative: &str, path: &Path) {
		self.reporter
			.set_current_file(format!("{}/{relative}", version.label));
		let bytes = match tokio::fs::read(path).await {
			Ok(bytes) => bytes,
			Err(e) => {
				self.reporter
					.record(DocumentIssue::warning(format!("could not read asset: {e}")));
				return;
			}
		};

		let public_path = normalized_asset_path(relative);
		let hash = ContentHash::of_bytes(&bytes);
		if let Some(existing) = self.assets.get(&public_path) {
			if *existing != hash {
				self.reporter.record(
					DocumentIssue::warning(format!(
						"asset `{public_path}` differs from an earlier copy; the first copy was kept"
					))
					.with_suggestion("rename the asset if both versions are needed"),
				);
			}
			return;
		}

		let destination = self
			.output_root
			.join(&self.options.assets_dir)
			.join(&public_path);
		if !self.options.dry_run {
			if let Err(e) = write_file(&destination, &bytes).await {
				self.reporter.record(DocumentIssue::warning(format!(
					"could not copy asset to `{}`: {e}",
					destination.display()
				)));
				return;
			}
			self.stats.written += 1;
		}

		debug!(asset = %public_path, "copied asset");
		self.assets.insert(public_path, hash);
		self.stats.assets_copied += 1;
	}

	/// Second pass: correct links to documents whose route changed. Runs
	/// only after every version has been walked.
	async fn rewrite_cross_links(&mut self) {
		for page in &mut self.pages {
			let (content, count) = rewrite_links(&page.content, &self.mapping);
			if count == 0 {
				continue;
			}

			debug!(page = %page.route, count, "rewrote cross links");
			self.stats.links_rewritten += count;
			page.content = content;
			if self.options.dry_run {
				continue;
			}

			if let Err(e) = write_file(&page.output_path, &page.content).await {
				self.reporter.record_for(
					format!("{}/{}", page.version, page.source_path),
					DocumentIssue::error(format!("could not rewrite links on disk: {e}")),
				);
			}
		}
	}

	async fn write_navigation(&mut self, navigation: &Navigation) -> DocshiftResult<()> {
		let json = navigation
			.to_json()
			.map_err(|e| DocshiftError::Navigation(e.to_string()))?;
		if self.options.dry_run {
			return Ok(());
		}

		write_file(&self.output_root.join(NAVIGATION_FILE), format!("{json}\n")).await?;
		self.stats.written += 1;
		Ok(())
	}
}

/// The route a document migrates to: the normalized source path, renamed by
/// a `slug` (absolute slugs are rooted at the version) or an `id`.
pub fn migrated_route(relative_path: &str, meta: &DocumentMeta) -> String {
	let route = normalized_route(relative_path);

	if let Some(slug) = meta.slug.as_deref() {
		let trimmed = slug.trim().trim_matches('/');
		if slug.trim().starts_with('/') {
			return if trimmed.is_empty() {
				"index".to_string()
			} else {
				trimmed.to_string()
			};
		}
		if !trimmed.is_empty() {
			return replace_last_segment(&route, trimmed);
		}
	}

	if let Some(id) = meta.id.as_deref() {
		let id = id.trim().trim_matches('/');
		if !id.is_empty() {
			return replace_last_segment(&route, id);
		}
	}

	route
}

fn replace_last_segment(route: &str, name: &str) -> String {
	match route.rsplit_once('/') {
		Some((parent, _)) => format!("{parent}/{name}"),
		None => name.to_string(),
	}
}

async fn check_source_root(root: &Path) -> DocshiftResult<()> {
	let metadata = tokio::fs::metadata(root)
		.await
		.map_err(|e| DocshiftError::SourceRoot {
			path: root.display().to_string(),
			reason: e.to_string(),
		})?;

	if !metadata.is_dir() {
		return Err(DocshiftError::SourceRoot {
			path: root.display().to_string(),
			reason: "not a directory".to_string(),
		});
	}

	Ok(())
}

fn is_ignored_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules"
}

async fn same_path(a: &Path, b: &Path) -> bool {
	if a == b {
		return true;
	}

	match (
		tokio::fs::canonicalize(a).await,
		tokio::fs::canonicalize(b).await,
	) {
		(Ok(a), Ok(b)) => a == b,
		_ => false,
	}
}

/// The version directories to migrate: the configured list in order, else
/// every visible subdirectory of the source root sorted by name. The output
/// directory is never treated as a version.
pub async fn discover_versions(options: &MigrationOptions) -> DocshiftResult<Vec<VersionDir>> {
	let root = &options.source_root;

	if !options.versions.is_empty() {
		let mut versions = Vec::with_capacity(options.versions.len());
		for name in &options.versions {
			let directory = root.join(name);
			let is_dir = tokio::fs::metadata(&directory)
				.await
				.is_ok_and(|metadata| metadata.is_dir());
			if !is_dir {
				return Err(DocshiftError::MissingVersion {
					version: name.clone(),
					root: root.display().to_string(),
				});
			}
			versions.push(VersionDir {
				label: version_label(name).to_string(),
				directory,
			});
		}
		return Ok(versions);
	}

	let outputs = [options.output_dir.clone(), options.output_root()];
	let mut entries = tokio::fs::read_dir(root)
		.await
		.map_err(|e| DocshiftError::SourceRoot {
			path: root.display().to_string(),
			reason: e.to_string(),
		})?;

	let mut found: Vec<(String, PathBuf)> = Vec::new();
	while let Some(entry) = entries.next_entry().await? {
		let name = entry.file_name().to_string_lossy().into_owned();
		if is_ignored_name(&name) || name.starts_with('_') {
			continue;
		}
		if !entry.file_type().await?.is_dir() {
			continue;
		}

		let path = entry.path();
		let mut is_output = false;
		for output in &outputs {
			is_output |= same_path(output, &path).await;
		}
		if !is_output {
			found.push((name, path));
		}
	}

	if found.is_empty() {
		return Err(DocshiftError::NoVersions(root.display().to_string()));
	}

	found.sort();
	Ok(found
		.into_iter()
		.map(|(name, directory)| VersionDir {
			label: version_label(&name).to_string(),
			directory,
		})
		.collect())
}

/// Build a `Gitignore` matcher from the `[exclude]` patterns, rooted at a
/// version directory.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> DocshiftResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			DocshiftError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| DocshiftError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

/// Every file below `root`, as sorted forward-slash paths relative to it.
/// Hidden entries, `node_modules` and excluded paths are skipped. Symbolic
/// links are not followed.
async fn collect_files(root: &Path, exclude: &Gitignore) -> DocshiftResult<Vec<String>> {
	let mut files = Vec::new();
	let mut pending = vec![root.to_path_buf()];

	while let Some(directory) = pending.pop() {
		let mut entries = tokio::fs::read_dir(&directory).await?;
		while let Some(entry) = entries.next_entry().await? {
			let name = entry.file_name();
			if is_ignored_name(&name.to_string_lossy()) {
				continue;
			}

			let path = entry.path();
			let is_dir = entry.file_type().await?.is_dir();
			if exclude.matched(&path, is_dir).is_ignore() {
				continue;
			}

			if is_dir {
				pending.push(path);
			} else if let Ok(relative) = path.strip_prefix(root) {
				files.push(to_slash(relative));
			}
		}
	}

	files.sort();
	Ok(files)
}

async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
	if let Some(parent) = path.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}

	tokio::fs::write(path, contents).await
}
