use thiserror::Error;

use crate::codeblocks::CodeBlockOptions;
use crate::codeblocks::ReferenceFetcher;
use crate::codeblocks::enrich_code_blocks;
use crate::config::MigrationOptions;
use crate::frontmatter::DocumentMeta;
use crate::frontmatter::TitleSource;
use crate::frontmatter::parse_document;
use crate::frontmatter::render_front_matter;
use crate::issues::DocumentIssue;
use crate::links::LinkContext;
use crate::links::resolve_links;
use crate::markup::repair_markup;
use crate::repair::run_repairs;
use crate::tree::Document;

/// A document as read from disk. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
	/// Path relative to the version root, with forward slashes.
	pub path: String,
	pub version: String,
	pub product: String,
	pub raw: String,
}

/// The final output for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedDocument {
	pub output: String,
	pub meta: DocumentMeta,
	/// Issues found while transforming, with lines relative to the source
	/// file.
	pub issues: Vec<DocumentIssue>,
	/// The output depends on where the source file lives: relative links were
	/// resolved or the title came from the file name.
	pub location_sensitive: bool,
	/// The output holds urls namespaced under the version it was transformed
	/// for.
	pub version_sensitive: bool,
}

/// Returned instead of a [`TransformedDocument`] when a document could not be
/// transformed. `document.output` holds the original text and
/// `document.issues` ends with an error describing the failure.
#[derive(Debug, Clone)]
pub struct Fallback {
	pub document: TransformedDocument,
	pub error: TransformError,
}

/// Why a single document could not be transformed. Never stops a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
	#[error("failed to parse markdown: {0}")]
	Parse(String),
	#[error("document is {size} bytes, over the {limit} byte limit")]
	TooLarge { size: u64, limit: u64 },
	#[error("parsed node has no source position")]
	MissingPosition,
}

/// Runs the per-document pipeline: extraction, tree passes, repairs.
pub struct Transformer<'a, F> {
	options: &'a MigrationOptions,
	known_versions: &'a [String],
	fetcher: &'a F,
}

impl<'a, F: ReferenceFetcher> Transformer<'a, F> {
	pub fn new(options: &'a MigrationOptions, known_versions: &'a [String], fetcher: &'a F) -> Self {
		Self {
			options,
			known_versions,
			fetcher,
		}
	}

	/// Transform one document. Any failure yields a [`Fallback`] carrying the
	/// untransformed text.
	pub async fn transform(&self, source: &SourceDocument) -> Result<TransformedDocument, Fallback> {
		let raw = normalize_line_endings(&source.raw);
		let mut issues = Vec::new();
		let parsed = parse_document(&raw, &source.path, &mut issues);

		let size = raw.len() as u64;
		if size > self.options.max_file_size {
			return Err(fallback(
				raw,
				parsed.meta,
				issues,
				TransformError::TooLarge {
					size,
					limit: self.options.max_file_size,
				},
			));
		}

		let mut tree = match Document::parse(&parsed.body) {
			Ok(tree) => tree,
			Err(error) => return Err(fallback(raw, parsed.meta, issues, error)),
		};

		let mut body_issues = Vec::new();
		let context = LinkContext {
			product: source.product.trim(),
			version: &source.version,
			known_versions: self.known_versions,
			source_path: &source.path,
			assets_dir: &self.options.assets_dir,
		};
		let links = resolve_links(&mut tree, &context, &mut body_issues);
		repair_markup(&mut tree, self.options.max_comment_length, &mut body_issues);
		enrich_code_blocks(
			&mut tree,
			self.fetcher,
			CodeBlockOptions {
				fetch_references: self.options.fetch_references,
				expandable_lines: self.options.expandable_lines,
			},
			&mut body_issues,
		)
		.await;

		let body = run_repairs(&tree.render(), &mut body_issues);
		issues.extend(
			body_issues
				.into_iter()
				.map(|issue| issue.offset_lines(parsed.body_line_offset)),
		);

		let output = compose(&render_front_matter(&parsed.meta), &body);
		let location_sensitive =
			links.location_sensitive || parsed.meta.title_source == TitleSource::FileName;

		Ok(TransformedDocument {
			output,
			meta: parsed.meta,
			issues,
			location_sensitive,
			version_sensitive: links.version_sensitive,
		})
	}
}

fn fallback(
	raw: String,
	meta: DocumentMeta,
	mut issues: Vec<DocumentIssue>,
	error: TransformError,
) -> Fallback {
	issues.push(
		DocumentIssue::error(format!("document was not transformed: {error}"))
			.with_suggestion("the original text was copied unchanged; convert it by hand"),
	);

	Fallback {
		document: TransformedDocument {
			output: raw,
			meta,
			issues,
			location_sensitive: false,
			version_sensitive: false,
		},
		error,
	}
}

fn normalize_line_endings(raw: &str) -> String {
	raw.strip_prefix('\u{feff}')
		.unwrap_or(raw)
		.replace("\r\n", "\n")
}

/// Join front matter and body with a single blank line and exactly one
/// trailing newline.
fn compose(front_matter: &str, body: &str) -> String {
	let body = body.trim_end();
	let body = match body.find(|c: char| c != '\n' && c != ' ' && c != '\t') {
		Some(start) => {
			let line_start = body[..start].rfind('\n').map_or(0, |index| index + 1);
			&body[line_start..]
		}
		None => "",
	};

	if body.is_empty() {
		front_matter.to_string()
	} else {
		format!("{front_matter}\n{body}\n")
	}
}
