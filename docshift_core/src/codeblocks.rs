use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::issues::DocumentIssue;
use crate::tree::CodeBlock;
use crate::tree::Document;
use crate::tree::NodeKind;

/// Meta token that marks a code block whose content is a url to fetch.
pub const REFERENCE_MARKER: &str = "reference";

/// Meta token that makes a code block collapsible.
pub const EXPANDABLE_MARKER: &str = "expandable";

static GITHUB_BLOB_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/blob/([^#?]+)(?:\?[^#]*)?(?:#L(\d+)(?:-L(\d+))?)?$")
		.expect("valid github regex")
});

/// Language signatures, tried in order. The first match wins.
static SIGNATURES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
	[
		("go", r"(?m)^package \w+\s*$|^func (?:\(\w+ \*?\w+\) )?\w+\("),
		(
			"rust",
			r"(?m)^\s*(?:pub(?:\(crate\))? )?(?:async )?fn \w+|^use \w+(?:::\w+)+|\blet mut \w+|^impl\b|#\[derive\(",
		),
		(
			"python",
			r"(?m)^\s*def \w+\(.*\):|^from [\w.]+ import |^import [\w.]+\s*$|^class \w+(?:\(.*\))?:\s*$",
		),
		(
			"typescript",
			r"(?m)^\s*(?:export )?interface \w+|^\s*(?:export )?type \w+ = |\b(?:const|let) \w+: \w+",
		),
		(
			"javascript",
			r#"(?m)\b(?:const|let|var) \w+ = |\bfunction\b|=> \{|\brequire\(|^import .* from ['"]|console\.log\("#,
		),
		("java", r"(?m)\bpublic (?:static )?(?:final )?(?:class|void|interface)\b|System\.out\."),
		(
			"bash",
			r"(?m)^\s*\$?\s*(?:npm|npx|yarn|pnpm|cargo|git|curl|wget|docker|cd|export|pip|brew|apt|apt-get|sudo|make|solana|anchor|rustup|sh|chmod|mkdir)\b",
		),
		("html", r"(?s)^\s*<[a-zA-Z!][^>]*>.*</[a-zA-Z]+>"),
		("yaml", r"(?m)^[\w-]+:(?:\s|$)"),
	]
	.into_iter()
	.map(|(lang, pattern)| (lang, Regex::new(pattern).expect("valid signature regex")))
	.collect()
});

/// Why a referenced file could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("fetching referenced code is disabled")]
	Disabled,
	#[error("request failed: {0}")]
	Request(String),
	#[error("server responded with status {status}")]
	Status { status: u16 },
	#[error("response body was empty")]
	Empty,
}

/// Retrieves the content of externally referenced code.
pub trait ReferenceFetcher {
	fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>>;
}

/// Fetches over HTTP with a request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
	client: reqwest::Client,
}

impl HttpFetcher {
	pub fn new(timeout: Duration) -> Result<Self, FetchError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.user_agent(concat!("docshift/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| FetchError::Request(e.to_string()))?;

		Ok(Self { client })
	}
}

impl ReferenceFetcher for HttpFetcher {
	async fn fetch(&self, url: &str) -> Result<String, FetchError> {
		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| FetchError::Request(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(FetchError::Status {
				status: status.as_u16(),
			});
		}

		let body = response
			.text()
			.await
			.map_err(|e| FetchError::Request(e.to_string()))?;
		if body.trim().is_empty() {
			return Err(FetchError::Empty);
		}

		Ok(body)
	}
}

/// A fetcher that never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl ReferenceFetcher for OfflineFetcher {
	async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
		Err(FetchError::Disabled)
	}
}

/// Where to fetch a referenced file and which lines to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSource {
	pub url: String,
	pub fetch_url: String,
	pub file_name: String,
	/// Inclusive, 1-indexed line range.
	pub lines: Option<(usize, usize)>,
}

impl ReferenceSource {
	/// Parse a reference url. GitHub `blob` urls are fetched from the raw
	/// content host and their `#L<a>-L<b>` fragment selects the lines.
	pub fn parse(url: &str) -> Self {
		let url = url.trim();
		if let Some(caps) = GITHUB_BLOB_RE.captures(url) {
			let path = &caps[3];
			let start = caps.get(4).and_then(|m| m.as_str().parse::<usize>().ok());
			let end = caps.get(5).and_then(|m| m.as_str().parse::<usize>().ok());

			return Self {
				url: url.to_string(),
				fetch_url: format!(
					"https://raw.githubusercontent.com/{}/{}/{path}",
					&caps[1], &caps[2]
				),
				file_name: file_name(path),
				lines: start.map(|start| (start, end.unwrap_or(start).max(start))),
			};
		}

		let without_fragment = url.split('#').next().unwrap_or(url);
		let path = without_fragment.split('?').next().unwrap_or(without_fragment);
		Self {
			url: url.to_string(),
			fetch_url: without_fragment.to_string(),
			file_name: file_name(path),
			lines: None,
		}
	}

	/// Keep only the selected lines of `content`.
	pub fn slice(&self, content: &str) -> String {
		let content = content.trim_end_matches('\n');
		match self.lines {
			Some((start, end)) => content
				.lines()
				.skip(start.saturating_sub(1))
				.take(end + 1 - start.max(1))
				.collect::<Vec<_>>()
				.join("\n"),
			None => content.to_string(),
		}
	}
}

fn file_name(path: &str) -> String {
	path.rsplit('/')
		.find(|segment| !segment.is_empty())
		.unwrap_or(path)
		.to_string()
}

/// The reference url of a block marked with [`REFERENCE_MARKER`] whose
/// content is a single url.
pub fn reference_url(code: &CodeBlock) -> Option<&str> {
	let marked = code
		.meta
		.as_deref()
		.is_some_and(|meta| meta.split_whitespace().any(|token| token == REFERENCE_MARKER));
	if !marked {
		return None;
	}

	let value = code.value.trim();
	let single_line = !value.contains('\n');
	let is_url = value.starts_with("https://") || value.starts_with("http://");
	(single_line && is_url).then_some(value)
}

/// A one-line comment in the syntax of `lang`.
pub fn comment_for(lang: Option<&str>, text: &str) -> String {
	let lang = lang.unwrap_or_default().to_ascii_lowercase();
	match lang.as_str() {
		"python" | "py" | "bash" | "sh" | "shell" | "zsh" | "yaml" | "yml" | "toml" | "ruby"
		| "rb" | "dockerfile" | "makefile" | "r" | "perl" | "powershell" | "ps1" | "text" | "" => {
			format!("# {text}")
		}
		"sql" | "lua" | "haskell" | "hs" => format!("-- {text}"),
		"html" | "xml" | "markdown" | "md" | "mdx" | "svg" | "vue" => format!("<!-- {text} -->"),
		"css" | "scss" | "less" => format!("/* {text} */"),
		_ => format!("// {text}"),
	}
}

/// Guess a language from the content of a code block.
pub fn sniff_language(code: &str) -> &'static str {
	let trimmed = code.trim();
	if let Some(shebang) = trimmed.lines().next().filter(|line| line.starts_with("#!")) {
		return if shebang.contains("python") {
			"python"
		} else if shebang.contains("node") {
			"javascript"
		} else {
			"bash"
		};
	}

	if looks_like_json(trimmed) {
		return "json";
	}

	SIGNATURES
		.iter()
		.find(|(_, pattern)| pattern.is_match(trimmed))
		.map_or("text", |(lang, _)| *lang)
}

/// Valid JSON, or brace-delimited text dense with quotes and colons.
fn looks_like_json(text: &str) -> bool {
	let delimited = (text.starts_with('{') && text.ends_with('}'))
		|| (text.starts_with('[') && text.ends_with(']'));
	if !delimited {
		return false;
	}

	if serde_json::from_str::<serde_json::Value>(text).is_ok() {
		return true;
	}

	let quotes = text.matches('"').count();
	let colons = text.matches("\":").count();
	quotes >= 4 && colons * 2 >= quotes / 2
}

fn meta_tokens(meta: Option<&str>) -> Vec<String> {
	meta.unwrap_or_default()
		.split_whitespace()
		.map(ToString::to_string)
		.collect()
}

/// Settings for the code-block enrichment pass.
#[derive(Debug, Clone, Copy)]
pub struct CodeBlockOptions {
	/// Whether reference urls are fetched. When false the fetcher is never
	/// called.
	pub fetch_references: bool,
	/// Blocks with more lines than this are marked expandable.
	pub expandable_lines: usize,
}

/// Code-block enrichment pass: fill reference blocks, assign missing
/// languages and mark long blocks as expandable.
pub async fn enrich_code_blocks<F: ReferenceFetcher>(
	document: &mut Document,
	fetcher: &F,
	options: CodeBlockOptions,
	issues: &mut Vec<DocumentIssue>,
) {
	let mut references: Vec<(usize, String)> = Vec::new();
	let mut index = 0;
	document.walk(&mut |node| {
		if let NodeKind::Code(code) = &node.kind {
			if let Some(url) = reference_url(code) {
				references.push((index, url.to_string()));
			}
			index += 1;
		}
	});

	let mut fetched: Vec<(usize, ReferenceSource, Result<String, FetchError>)> = Vec::new();
	for (index, url) in references {
		let source = ReferenceSource::parse(&url);
		let result = if options.fetch_references {
			fetcher.fetch(&source.fetch_url).await
		} else {
			Err(FetchError::Disabled)
		};
		if let Err(e) = &result {
			if options.fetch_references {
				tracing::warn!(url = %source.url, error = %e, "could not fetch referenced code");
			}
		}
		fetched.push((index, source, result));
	}

	let mut fetched = fetched.into_iter().peekable();
	let mut index = 0;
	document.walk_mut(&mut |node| {
		let line = node.line;
		let NodeKind::Code(code) = &mut node.kind else {
			return;
		};
		let current = index;
		index += 1;
		let mut changed = false;

		if fetched.peek().is_some_and(|(i, ..)| *i == current) {
			if let Some((_, source, result)) = fetched.next() {
				fill_reference(code, &source, result, line, issues);
				changed = true;
			}
		}

		if code.lang.as_deref().is_none_or(str::is_empty) {
			code.lang = Some(sniff_language(&code.value).to_string());
			changed = true;
		}

		let mut tokens = meta_tokens(code.meta.as_deref());
		if code.value.lines().count() > options.expandable_lines
			&& !tokens.iter().any(|token| token == EXPANDABLE_MARKER)
		{
			tokens.push(EXPANDABLE_MARKER.to_string());
			code.meta = Some(tokens.join(" "));
			changed = true;
		}

		if changed {
			node.touched = true;
		}
	});
}

fn fill_reference(
	code: &mut CodeBlock,
	source: &ReferenceSource,
	result: Result<String, FetchError>,
	line: usize,
	issues: &mut Vec<DocumentIssue>,
) {
	let mut tokens: Vec<String> = meta_tokens(code.meta.as_deref())
		.into_iter()
		.filter(|token| token != REFERENCE_MARKER)
		.collect();

	match result {
		Ok(content) => {
			code.value = source.slice(&content);
			if tokens.is_empty() && !source.file_name.is_empty() {
				tokens.push(source.file_name.clone());
			}
		}
		Err(e) => {
			code.value = comment_for(code.lang.as_deref(), &format!("Source: {}", source.url));
			if !matches!(e, FetchError::Disabled) {
				issues.push(
					DocumentIssue::info(format!("referenced code `{}` was not fetched: {e}", source.url))
						.at_line(line)
						.with_suggestion("a comment pointing at the source was left in its place"),
				);
			}
		}
	}

	code.meta = (!tokens.is_empty()).then(|| tokens.join(" "));
}
