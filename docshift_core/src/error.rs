use miette::Diagnostic;
use thiserror::Error;

/// Errors that stop a migration run. Everything else is reported as a
/// [`MigrationIssue`](crate::MigrationIssue) and the run carries on.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum DocshiftError {
	#[error(transparent)]
	#[diagnostic(code(docshift::io_error))]
	Io(#[from] std::io::Error),

	#[error("missing product label")]
	#[diagnostic(
		code(docshift::missing_product),
		help("pass `--product <label>` or set `product` in docshift.toml")
	)]
	MissingProduct,

	#[error("invalid product label `{0}`")]
	#[diagnostic(
		code(docshift::invalid_product),
		help("the product label becomes a url segment and cannot contain `/` or `\\`")
	)]
	InvalidProduct(String),

	#[error("source root `{path}` is not a readable directory: {reason}")]
	#[diagnostic(
		code(docshift::source_root),
		help("point `--source` at the directory that holds one subdirectory per version")
	)]
	SourceRoot { path: String, reason: String },

	#[error("no version directories found under `{0}`")]
	#[diagnostic(
		code(docshift::no_versions),
		help("each version of the docs must live in its own subdirectory of the source root")
	)]
	NoVersions(String),

	#[error("configured version `{version}` does not exist under `{root}`")]
	#[diagnostic(code(docshift::missing_version))]
	MissingVersion { version: String, root: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(docshift::config_parse),
		help("check that docshift.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("failed to prepare output directory `{path}`: {reason}")]
	#[diagnostic(code(docshift::output_dir))]
	OutputDir { path: String, reason: String },

	#[error("failed to serialize navigation: {0}")]
	#[diagnostic(code(docshift::navigation))]
	Navigation(String),
}

pub type DocshiftResult<T> = Result<T, DocshiftError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
