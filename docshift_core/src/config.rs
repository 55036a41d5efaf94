use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::DocshiftError;
use crate::DocshiftResult;

/// Default maximum document size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default timeout for fetching externally referenced code.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Code blocks with more lines than this are marked `expandable`.
pub const DEFAULT_EXPANDABLE_LINES: usize = 10;

/// Comments longer than this are dropped instead of converted.
pub const DEFAULT_MAX_COMMENT_LENGTH: usize = 500;

/// Default directory (relative to the output root) for shared assets.
pub const DEFAULT_ASSETS_DIR: &str = "images";

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["docshift.toml", ".docshift.toml"];

/// Configuration loaded from a `docshift.toml` file in the source root.
///
/// ```toml
/// product = "sdk"
/// output = "../site"
/// versions = ["1.0", "2.0"]
/// assets_dir = "images"
/// max_file_size = 10485760
/// expandable_lines = 10
///
/// [exclude]
/// patterns = ["drafts/", "*.draft.md"]
///
/// [fetch]
/// enabled = true
/// timeout_secs = 10
///
/// [markup]
/// max_comment_length = 500
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct DocshiftConfig {
	/// Product label used as the first url segment of every migrated page.
	#[serde(default)]
	pub product: Option<String>,
	/// Output directory, relative to the source root.
	#[serde(default)]
	pub output: Option<PathBuf>,
	/// Explicit, ordered list of version directories to migrate.
	#[serde(default)]
	pub versions: Vec<String>,
	/// Directory under the output root that receives copied assets.
	#[serde(default)]
	pub assets_dir: Option<String>,
	/// Documents larger than this are copied through untransformed.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// Line count above which code blocks are marked `expandable`.
	#[serde(default = "default_expandable_lines")]
	pub expandable_lines: usize,
	#[serde(default)]
	pub exclude: ExcludeConfig,
	#[serde(default)]
	pub fetch: FetchConfig,
	#[serde(default)]
	pub markup: MarkupConfig,
}

/// Gitignore-style patterns for files and directories to skip.
#[derive(Debug, Default, Deserialize)]
pub struct ExcludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Controls network fetching of `reference` code blocks.
#[derive(Debug, Deserialize)]
pub struct FetchConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_fetch_timeout_secs")]
	pub timeout_secs: u64,
}

impl Default for FetchConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct MarkupConfig {
	/// Comments longer than this many characters are dropped and reported.
	#[serde(default = "default_max_comment_length")]
	pub max_comment_length: usize,
}

impl Default for MarkupConfig {
	fn default() -> Self {
		Self {
			max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
		}
	}
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

fn default_expandable_lines() -> usize {
	DEFAULT_EXPANDABLE_LINES
}

fn default_fetch_timeout_secs() -> u64 {
	DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_max_comment_length() -> usize {
	DEFAULT_MAX_COMMENT_LENGTH
}

impl DocshiftConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> DocshiftResult<Option<DocshiftConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_from(&config_path).map(Some)
	}

	/// Load the config from an explicit path.
	pub fn load_from(path: &Path) -> DocshiftResult<DocshiftConfig> {
		let content = std::fs::read_to_string(path)?;
		toml::from_str(&content).map_err(|e| DocshiftError::ConfigParse(e.to_string()))
	}
}

/// The resolved configuration for a single migration run.
///
/// Build it with [`MigrationOptions::new`] (or
/// [`MigrationOptions::from_config`]) and then adjust the public fields; the
/// run calls [`MigrationOptions::validate`] before touching the file system.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct MigrationOptions {
	/// Directory holding one subdirectory per documentation version.
	pub source_root: PathBuf,
	/// Final destination of the migrated site.
	pub output_dir: PathBuf,
	/// Product label, the first url segment of every page.
	pub product: String,
	/// Explicit version directory names. Empty means every subdirectory.
	pub versions: Vec<String>,
	/// Process and report, but write nothing.
	pub dry_run: bool,
	/// Write to `staging_dir` instead of `output_dir`. Links keep pointing at
	/// final routes.
	pub staging: bool,
	/// Where staged output goes. Defaults to `<output_dir>.staging`.
	pub staging_dir: Option<PathBuf>,
	/// Emit `navigation.json`.
	pub update_navigation: bool,
	/// Fetch `reference` code blocks over the network.
	pub fetch_references: bool,
	pub fetch_timeout: Duration,
	pub max_file_size: u64,
	pub expandable_lines: usize,
	pub max_comment_length: usize,
	pub assets_dir: String,
	/// Gitignore-style patterns, relative to each version root.
	pub exclude_patterns: Vec<String>,
}

impl MigrationOptions {
	pub fn new(
		source_root: impl Into<PathBuf>,
		output_dir: impl Into<PathBuf>,
		product: impl Into<String>,
	) -> Self {
		Self {
			source_root: source_root.into(),
			output_dir: output_dir.into(),
			product: product.into(),
			versions: Vec::new(),
			dry_run: false,
			staging: false,
			staging_dir: None,
			update_navigation: false,
			fetch_references: false,
			fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			expandable_lines: DEFAULT_EXPANDABLE_LINES,
			max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
			assets_dir: DEFAULT_ASSETS_DIR.to_string(),
			exclude_patterns: Vec::new(),
		}
	}

	/// Construct options from an optional config file. `product` and
	/// `output_dir` arguments take precedence over the file values.
	pub fn from_config(
		source_root: impl Into<PathBuf>,
		config: Option<&DocshiftConfig>,
		product: Option<String>,
		output_dir: Option<PathBuf>,
	) -> Self {
		let source_root = source_root.into();
		let product = product
			.or_else(|| config.and_then(|c| c.product.clone()))
			.unwrap_or_default();
		let output_dir = output_dir
			.or_else(|| {
				config
					.and_then(|c| c.output.as_ref())
					.map(|output| source_root.join(output))
			})
			.unwrap_or_else(|| source_root.join("migrated"));
		let mut options = Self::new(source_root, output_dir, product);

		if let Some(config) = config {
			options.versions.clone_from(&config.versions);
			options.max_file_size = config.max_file_size;
			options.expandable_lines = config.expandable_lines;
			options.max_comment_length = config.markup.max_comment_length;
			options.fetch_references = config.fetch.enabled;
			options.fetch_timeout = Duration::from_secs(config.fetch.timeout_secs);
			options.exclude_patterns.clone_from(&config.exclude.patterns);
			if let Some(assets_dir) = &config.assets_dir {
				options.assets_dir.clone_from(assets_dir);
			}
		}

		options
	}

	/// Reject configurations that must stop the run before any file is
	/// written.
	pub fn validate(&self) -> DocshiftResult<()> {
		let product = self.product.trim();
		if product.is_empty() {
			return Err(DocshiftError::MissingProduct);
		}

		if product.contains(['/', '\\']) {
			return Err(DocshiftError::InvalidProduct(product.to_string()));
		}

		Ok(())
	}

	/// The directory that actually receives output for this run.
	pub fn output_root(&self) -> PathBuf {
		if !self.staging {
			return self.output_dir.clone();
		}

		self.staging_dir
			.clone()
			.unwrap_or_else(|| self.output_dir.with_extension("staging"))
	}
}
