use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use rstest::rstest;
use similar_asserts::assert_eq;

use super::*;
use crate::links::LinkContext;
use crate::links::LinkDependencies;
use crate::links::resolve_links;
use crate::links::resolve_target;
use crate::markup::convert_comments;
use crate::markup::escape_operators;
use crate::markup::repair_markup;
use crate::paths::normalized_route;
use crate::paths::title_case;
use crate::paths::version_label;
use crate::protect;
use crate::repair::REPAIR_SEQUENCE;
use crate::repair::balance_component_tags;
use crate::repair::convert_admonitions;
use crate::repair::convert_attribute_names;
use crate::repair::escape_table_cells;
use crate::repair::run_repairs;
use crate::repair::wrap_template_tokens;
use crate::tree::Document;

const KNOWN_VERSIONS: [&str; 2] = ["1.0", "2.0"];

fn known_versions() -> Vec<String> {
	KNOWN_VERSIONS.iter().map(ToString::to_string).collect()
}

fn link_context<'a>(versions: &'a [String], source_path: &'a str) -> LinkContext<'a> {
	LinkContext {
		product: "sdk",
		version: "2.0",
		known_versions: versions,
		source_path,
		assets_dir: "images",
	}
}

fn write_source(root: &Path, relative: &str, content: &str) {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir: {e}"));
	}
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

fn read_output(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn migration_options(root: &Path) -> MigrationOptions {
	MigrationOptions::new(root.join("src"), root.join("out"), "sdk")
}

fn source(path: &str, raw: &str) -> SourceDocument {
	SourceDocument {
		path: path.to_string(),
		version: "1.0".to_string(),
		product: "sdk".to_string(),
		raw: raw.to_string(),
	}
}

/// Returns the same body for every url and counts the calls.
struct StaticFetcher {
	body: &'static str,
	calls: Cell<usize>,
}

impl StaticFetcher {
	fn new(body: &'static str) -> Self {
		Self {
			body,
			calls: Cell::new(0),
		}
	}
}

impl ReferenceFetcher for StaticFetcher {
	async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
		self.calls.set(self.calls.get() + 1);
		Ok(self.body.to_string())
	}
}

// --- Path tests ---

#[rstest]
#[case::ordering_prefixes("02-guides/01-start.md", "guides/start")]
#[case::underscore_prefix("3_reference/api.mdx", "reference/api")]
#[case::plain("intro.md", "intro")]
#[case::markdown_extension("faq.markdown", "faq")]
#[case::prefix_only_segment("01/notes.md", "01/notes")]
fn normalizes_routes(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(normalized_route(input), expected);
}

#[rstest]
#[case("02-getting_started.md", "Getting Started")]
#[case("api-reference", "Api Reference")]
#[case("faq", "Faq")]
fn title_cases_names(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(title_case(input), expected);
}

#[rstest]
#[case("version-1.0", "1.0")]
#[case("2.0", "2.0")]
#[case("version-", "version-")]
fn labels_versions(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(version_label(input), expected);
}

// --- Front matter tests ---

#[test]
fn parse_front_matter_fields() {
	let raw = "---\ntitle: Intro\nsidebar_position: 2\nsidebar_label: Start\nslug: /start\nkeywords: [a, \
	           b]\n---\n\nBody text here.\n";
	let mut issues = Vec::new();
	let parsed = parse_document(raw, "intro.md", &mut issues);

	assert!(issues.is_empty());
	assert_eq!(parsed.meta.title, "Intro");
	assert_eq!(parsed.meta.title_source, TitleSource::Metadata);
	assert_eq!(parsed.meta.ordering, Some(2));
	assert_eq!(parsed.meta.sidebar_title.as_deref(), Some("Start"));
	assert_eq!(parsed.meta.slug.as_deref(), Some("/start"));
	assert_eq!(parsed.meta.description.as_deref(), Some("Body text here."));
	assert!(parsed.meta.extra.contains_key("keywords"));
	assert!(!parsed.meta.extra.contains_key("sidebar_position"));
	assert_eq!(parsed.body_line_offset, 7);
	assert_eq!(parsed.body, "\nBody text here.\n");
}

#[test]
fn title_from_first_heading_is_removed_from_body() {
	let raw = "# Getting *Started*\n\nThis guide walks you through setup.\n";
	let mut issues = Vec::new();
	let parsed = parse_document(raw, "start.md", &mut issues);

	assert_eq!(parsed.meta.title, "Getting Started");
	assert_eq!(parsed.meta.title_source, TitleSource::Heading);
	assert_eq!(
		parsed.meta.description.as_deref(),
		Some("This guide walks you through setup.")
	);
	assert_eq!(parsed.body, "\n\nThis guide walks you through setup.\n");
}

#[test]
fn setext_heading_is_a_title() {
	let raw = "Getting Started\n===============\n\nThis guide walks you through setup.\n";
	let mut issues = Vec::new();
	let parsed = parse_document(raw, "start.md", &mut issues);

	assert_eq!(parsed.meta.title, "Getting Started");
	assert_eq!(parsed.meta.title_source, TitleSource::Heading);
	assert_eq!(
		parsed.meta.description.as_deref(),
		Some("This guide walks you through setup.")
	);
	assert_eq!(parsed.body, "\n\n\nThis guide walks you through setup.\n");
}

#[rstest]
#[case::list_item("- item\n===\n")]
#[case::level_two("Section\n-------\n")]
fn setext_lookalikes_are_not_titles(#[case] raw: &str) {
	let parsed = parse_document(raw, "notes.md", &mut Vec::new());

	assert_eq!(parsed.meta.title, "Notes");
	assert_eq!(parsed.meta.title_source, TitleSource::FileName);
	assert_eq!(parsed.body, raw);
}

#[test]
fn heading_inside_code_fence_is_not_a_title() {
	let raw = "```md\n# Not a title\n```\n";
	let mut issues = Vec::new();
	let parsed = parse_document(raw, "guides/index.md", &mut issues);

	assert_eq!(parsed.meta.title, "Guides");
	assert_eq!(parsed.meta.title_source, TitleSource::FileName);
	assert_eq!(parsed.body, raw);
}

#[rstest]
#[case::index("guides/index.md", "Guides")]
#[case::readme("02-setup/README.md", "Setup")]
#[case::plain("getting-started.md", "Getting Started")]
#[case::root_index("index.md", "Index")]
fn titles_from_file_names(#[case] path: &str, #[case] expected: &str) {
	assert_eq!(title_from_file_name(path), expected);
}

#[test]
fn invalid_front_matter_is_reported() {
	let raw = "---\ntitle: [unclosed\n---\nBody paragraph text.\n";
	let mut issues = Vec::new();
	let parsed = parse_document(raw, "broken.md", &mut issues);

	assert_eq!(issues.len(), 1);
	assert_eq!(issues[0].severity, Severity::Error);
	assert_eq!(issues[0].line, Some(1));
	assert_eq!(parsed.meta.title, "Broken");
}

#[test]
fn derived_description_skips_lists_and_short_text() {
	let raw = "# Title\n\n- a list item\n- another\n\nShort.\n";
	let mut issues = Vec::new();
	let parsed = parse_document(raw, "title.md", &mut issues);

	assert_eq!(parsed.meta.description, None);
}

#[test]
fn render_front_matter_in_target_order() {
	let mut issues = Vec::new();
	let parsed = parse_document(
		"---\nicon: rocket\ndescription: Short description.\ntitle: Intro\n---\n",
		"intro.md",
		&mut issues,
	);

	assert_eq!(
		render_front_matter(&parsed.meta),
		"---\ntitle: Intro\ndescription: Short description.\nicon: rocket\n---\n"
	);
}

// --- Protection tests ---

#[test]
fn protected_code_is_never_rewritten() {
	let text = "Use `snake_case` for some_name.\n\n```rust\nlet some_value = 1;\n```\n";
	let output = protect::apply(text, |text| text.replace('_', "\\_"));

	assert_eq!(
		output,
		"Use `snake_case` for some\\_name.\n\n```rust\nlet some_value = 1;\n```\n"
	);
}

#[test]
fn code_regions_cover_fences_and_spans() {
	let text = "a `b` c\n```\nd\n```\n";
	let regions = protect::code_regions(text);

	assert_eq!(regions, vec![2..5, 8..17]);
}

#[test]
fn unclosed_fence_runs_to_end_of_text() {
	let text = "intro\n~~~\nnever closed\n";
	let regions = protect::code_regions(text);

	assert_eq!(regions, vec![6..text.len()]);
}

#[test]
fn protected_lines_map_back_to_source() {
	let protected = protect::protect("```\na\nb\n```\ntext\n");

	assert_eq!(protected.text, "@@PROTECTED_0@@\ntext\n");
	assert_eq!(protected.original_line(1), 1);
	assert_eq!(protected.original_line(2), 5);
}

// --- Tree tests ---

#[test]
fn untouched_tree_renders_source_unchanged() -> Result<(), TransformError> {
	let source = "# Title\n\nSome *emphasis* and [a link](./a.md).\n\n- item one\n- item \
	              two\n\n```rust\nfn main() {}\n```\n\n| a | b |\n| - | - |\n| 1 | 2 \
	              |\n\n<div>raw</div>\n\n> quoted text\n";
	let document = Document::parse(source)?;

	assert_eq!(document.render(), source);

	Ok(())
}

// --- Link tests ---

#[rstest]
#[case::parent_relative("../sibling.md", Some("/sdk/2.0/a/sibling"))]
#[case::ordering_and_anchor("./02-guides/01-start.md#setup", Some("/sdk/2.0/a/b/guides/start#setup"))]
#[case::relative_asset("../img/01-diagram.png", Some("/images/a/img/diagram.png"))]
#[case::escaped_root("../../../x.md", Some("/sdk/2.0/x"))]
#[case::known_version("/sdk/1.0/intro", Some("/sdk/1.0/intro"))]
#[case::unknown_version("/sdk/3.5/intro", Some("/sdk/2.0/intro"))]
#[case::product_only("/sdk/guides/intro.md", Some("/sdk/2.0/guides/intro"))]
#[case::unprefixed("/guides/intro", Some("/sdk/2.0/guides/intro"))]
#[case::external("https://example.com/page", None)]
#[case::mail("mailto:team@example.com", None)]
#[case::anchor("#usage", None)]
#[case::protocol_relative("//cdn.example.com/x.js", None)]
#[case::absolute_asset("/img/logo.png", None)]
fn resolves_link_targets(#[case] target: &str, #[case] expected: Option<&str>) {
	let versions = known_versions();
	let context = link_context(&versions, "a/b/page.md");
	let resolved = resolve_target(target, &context);

	assert_eq!(resolved.map(|link| link.url).as_deref(), expected);
}

#[rstest]
#[case::relative_page("./intro.md", true)]
#[case::relative_asset("./img/logo.png", false)]
#[case::known_version("/sdk/1.0/intro", false)]
#[case::current_known_version("/sdk/2.0/intro", false)]
#[case::unknown_version("/sdk/3.5/intro", true)]
#[case::product_only("/sdk/intro", true)]
#[case::unprefixed("/intro", true)]
fn flags_urls_that_take_the_current_version(#[case] target: &str, #[case] expected: bool) {
	let versions = known_versions();
	let context = link_context(&versions, "page.md");
	let resolved =
		resolve_target(target, &context).unwrap_or_else(|| panic!("`{target}` should resolve"));

	assert_eq!(resolved.current_version, expected);
}

#[test]
fn known_version_links_keep_the_document_version_independent() -> Result<(), TransformError> {
	let versions = known_versions();
	let context = link_context(&versions, "page.md");
	let mut document = Document::parse("Back to [v1](/sdk/1.0/intro) or [docs](https://x.dev).\n")?;
	let dependencies = resolve_links(&mut document, &context, &mut Vec::new());

	assert_eq!(dependencies, LinkDependencies::default());

	Ok(())
}

#[test]
fn resolve_links_rewrites_markdown_and_markup() -> Result<(), TransformError> {
	let versions = known_versions();
	let context = link_context(&versions, "a/b/page.md");
	let mut document = Document::parse(
		"See [sibling](../sibling.md) and <a href=\"./other.md\">other</a>.\n\n[def]: ./02-def.md\n",
	)?;
	let mut issues = Vec::new();
	let dependencies = resolve_links(&mut document, &context, &mut issues);

	assert!(dependencies.location_sensitive);
	assert!(dependencies.version_sensitive);
	assert!(issues.is_empty());
	assert_eq!(
		document.render(),
		"See [sibling](/sdk/2.0/a/sibling) and <a href=\"/sdk/2.0/a/b/other\">other</a>.\n\n[def]: \
		 /sdk/2.0/a/b/def\n"
	);

	Ok(())
}

#[test]
fn clamped_links_are_reported() -> Result<(), TransformError> {
	let versions = known_versions();
	let context = link_context(&versions, "page.md");
	let mut document = Document::parse("Up [there](../../x.md).\n")?;
	let mut issues = Vec::new();
	resolve_links(&mut document, &context, &mut issues);

	assert_eq!(issues.len(), 1);
	assert_eq!(issues[0].severity, Severity::Warning);
	assert_eq!(issues[0].line, Some(1));

	Ok(())
}

// --- Markup tests ---

#[test]
fn comments_become_expression_comments() {
	let mut issues = Vec::new();
	let converted = convert_comments("<!-- hello */ there -->", 1, 500, &mut issues);

	assert_eq!(converted, "{/* hello *\\/ there */}");
	assert!(issues.is_empty());
}

#[test]
fn long_comments_are_removed_and_reported() {
	let mut issues = Vec::new();
	let converted = convert_comments("<!-- a very long comment -->", 3, 5, &mut issues);

	assert_eq!(converted, "");
	assert_eq!(issues.len(), 1);
	assert_eq!(issues[0].severity, Severity::Info);
	assert_eq!(issues[0].line, Some(3));
}

#[test]
fn unterminated_comment_is_reported() {
	let mut issues = Vec::new();
	let converted = convert_comments("<!-- never closed", 1, 500, &mut issues);

	assert_eq!(converted, " never closed");
	assert_eq!(issues[0].severity, Severity::Warning);
}

#[rstest]
#[case("a -> b", "a `->` b")]
#[case("x <= y and y >= z", "x `<=` y and y `>=` z")]
#[case("fewer than <5 items", "fewer than &lt;5 items")]
#[case("plain text", "plain text")]
fn escapes_operators(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(escape_operators(input), expected);
}

#[test]
fn disclosures_become_accordions() -> Result<(), TransformError> {
	let mut document = Document::parse(
		"<details open>\n<summary>More info</summary>\n\nHidden text.\n\n</details>\n",
	)?;
	let mut issues = Vec::new();
	repair_markup(&mut document, 500, &mut issues);
	let rendered = document.render();

	assert!(issues.is_empty());
	assert!(rendered.contains("<Accordion title=\"More info\" defaultOpen>"));
	assert!(rendered.contains("</Accordion>"));
	assert!(!rendered.contains("details"));
	assert!(!rendered.contains("summary"));

	Ok(())
}

#[test]
fn commented_disclosure_is_left_alone() -> Result<(), TransformError> {
	let mut document = Document::parse("<!-- <details>old</details> -->\n")?;
	let mut issues = Vec::new();
	repair_markup(&mut document, 500, &mut issues);

	assert_eq!(document.render(), "{/* <details>old</details> */}\n");

	Ok(())
}

#[test]
fn placeholder_tags_become_inline_code() -> Result<(), TransformError> {
	let mut document = Document::parse("Replace <name> with yours, keep <b>this</b>.\n")?;
	let mut issues = Vec::new();
	repair_markup(&mut document, 500, &mut issues);

	assert_eq!(
		document.render(),
		"Replace `<name>` with yours, keep <b>this</b>.\n"
	);

	Ok(())
}

// --- Code block tests ---

#[rstest]
#[case::rust("fn main() {\n    let mut x = 1;\n}", "rust")]
#[case::json("{\"name\": \"docshift\", \"version\": 1}", "json")]
#[case::shebang("#!/bin/bash\necho hi", "bash")]
#[case::python("def greet():\n    return 1", "python")]
#[case::shell("npm install docshift", "bash")]
#[case::go("package main\n\nfunc main() {}", "go")]
#[case::yaml("name: docshift\nversion: 1", "yaml")]
#[case::unknown("just some words", "text")]
fn sniffs_languages(#[case] code: &str, #[case] expected: &str) {
	assert_eq!(sniff_language(code), expected);
}

#[test]
fn parses_github_reference_urls() {
	let source = ReferenceSource::parse("https://github.com/org/repo/blob/main/src/lib.rs#L2-L3");

	assert_eq!(
		source.fetch_url,
		"https://raw.githubusercontent.com/org/repo/main/src/lib.rs"
	);
	assert_eq!(source.file_name, "lib.rs");
	assert_eq!(source.lines, Some((2, 3)));
	assert_eq!(source.slice("a\nb\nc\nd\n"), "b\nc");
}

#[tokio::test]
async fn fetches_referenced_code() -> Result<(), TransformError> {
	let fetcher = StaticFetcher::new("a\nb\nc\nd\n");
	let mut document = Document::parse(
		"```rust reference\nhttps://github.com/org/repo/blob/main/src/lib.rs#L2-L3\n```\n",
	)?;
	let mut issues = Vec::new();
	let options = CodeBlockOptions {
		fetch_references: true,
		expandable_lines: 10,
	};
	enrich_code_blocks(&mut document, &fetcher, options, &mut issues).await;

	assert_eq!(fetcher.calls.get(), 1);
	assert_eq!(document.render(), "```rust lib.rs\nb\nc\n```\n");

	Ok(())
}

#[tokio::test]
async fn disabled_fetching_never_calls_the_fetcher() -> Result<(), TransformError> {
	let fetcher = StaticFetcher::new("unused");
	let mut document =
		Document::parse("```rust reference\nhttps://github.com/org/repo/blob/main/src/lib.rs\n```\n")?;
	let mut issues = Vec::new();
	let options = CodeBlockOptions {
		fetch_references: false,
		expandable_lines: 10,
	};
	enrich_code_blocks(&mut document, &fetcher, options, &mut issues).await;

	assert_eq!(fetcher.calls.get(), 0);
	assert!(issues.is_empty());
	assert_eq!(
		document.render(),
		"```rust\n// Source: https://github.com/org/repo/blob/main/src/lib.rs\n```\n"
	);

	Ok(())
}

#[tokio::test]
async fn long_blocks_are_expandable_and_missing_languages_sniffed() -> Result<(), TransformError> {
	let body = (1..=12).map(|n| format!("let v{n} = {n};")).collect::<Vec<_>>().join("\n");
	let source = format!("```rust\n{body}\n```\n\n```\nfn main() {{}}\n```\n");
	let mut document = Document::parse(&source)?;
	let mut issues = Vec::new();
	let options = CodeBlockOptions {
		fetch_references: false,
		expandable_lines: 10,
	};
	enrich_code_blocks(&mut document, &OfflineFetcher, options, &mut issues).await;

	assert_eq!(
		document.render(),
		format!("```rust expandable\n{body}\n```\n\n```rust\nfn main() {{}}\n```\n")
	);

	Ok(())
}

// --- Repair tests ---

#[test]
fn admonitions_become_callouts() {
	assert_eq!(
		convert_admonitions(":::tip[Heads up]\nBe careful.\n:::"),
		"<Tip>\n**Heads up**\n\nBe careful.\n</Tip>"
	);
	assert_eq!(
		convert_admonitions(":::danger\nStop.\n:::"),
		"<Warning>\nStop.\n</Warning>"
	);
}

#[test]
fn table_cells_are_escaped() {
	assert_eq!(
		escape_table_cells("| a | {x} |\n| <3 | <b>ok</b> |\noutside {x}"),
		"| a | \\{x\\} |\n| &lt;3 | <b>ok</b> |\noutside {x}"
	);
}

#[rstest]
#[case("Use {{ name }} here", "Use `{{ name }}` here")]
#[case("Set ${HOME} first", "Set `${HOME}` first")]
#[case("<Tab value={x}>", "<Tab value={x}>")]
#[case("escaped \\{x}", "escaped \\{x}")]
fn wraps_template_tokens(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(wrap_template_tokens(input), expected);
}

#[test]
fn attribute_names_follow_component_conventions() {
	assert_eq!(
		convert_attribute_names(
			"<div class=\"a\" data-id=\"1\" stroke-width=\"2\"><label for=\"x\">X</label></div>"
		),
		"<div className=\"a\" data-id=\"1\" strokeWidth=\"2\"><label htmlFor=\"x\">X</label></div>"
	);
}

#[test]
fn component_tags_are_balanced() {
	let balanced = balance_component_tags("<Tabs>\n<TabItem>\nText\n</Tabs>\n</Card>\n");

	assert!(balanced.contains("</TabItem></Tabs>"));
	assert!(!balanced.contains("</Card>"));
	assert_eq!(
		balance_component_tags("<Note>\nText"),
		"<Note>\nText\n\n</Note>\n"
	);
	assert_eq!(
		balance_component_tags("<Card title=\"x\" />\n{/* <Tabs> */}\n"),
		"<Card title=\"x\" />\n{/* <Tabs> */}\n"
	);
}

#[rstest]
#[case::admonition(":::note\nRemember this.\n:::\n")]
#[case::table("| a | {x} | <3 |\n| - | - | - |\n")]
#[case::tokens("Use {{ name }} and {value}.\n")]
#[case::unbalanced("<Tabs>\n<TabItem>\nText\n</Tabs>\n</Card>\n<Steps>\n")]
#[case::blank_lines("a\n\n\n\n\nb\n")]
#[case::attributes("<img class=\"x\" src=\"/a.png\" />\n")]
fn repair_sequence_is_idempotent(#[case] input: &str) {
	let mut issues = Vec::new();
	let once = run_repairs(input, &mut issues);
	let twice = run_repairs(&once, &mut issues);

	assert_eq!(twice, once);
}

#[test]
fn repair_sequence_order_is_fixed() {
	let names: Vec<&str> = REPAIR_SEQUENCE.iter().map(|step| step.name).collect();

	assert_eq!(
		names,
		vec![
			"convert_admonitions",
			"escape_table_cells",
			"wrap_template_tokens",
			"convert_attribute_names",
			"balance_component_tags",
			"collapse_blank_lines",
		]
	);
}

#[test]
fn repair_issues_point_at_source_lines() {
	let mut issues = Vec::new();
	run_repairs("```\na\nb\n```\n\n</Card>\n", &mut issues);

	assert_eq!(issues.len(), 1);
	assert_eq!(issues[0].line, Some(6));
}

#[test]
fn repairs_leave_code_alone() {
	let input = "```md\n:::note\n{x}\n:::\n```\n";
	let mut issues = Vec::new();

	assert_eq!(run_repairs(input, &mut issues), input);
}

// --- Transform tests ---

#[tokio::test]
async fn transforms_a_document() {
	let options = MigrationOptions::new("src", "out", "sdk");
	let versions = vec!["1.0".to_string()];
	let transformer = Transformer::new(&options, &versions, &OfflineFetcher);
	let raw = "---\ntitle: Install\n---\n\nRead the [setup guide](./02-setup.md).\n\n:::note\nRemember \
	           this.\n:::\n";
	let document = transformer
		.transform(&source("guides/install.md", raw))
		.await
		.unwrap_or_else(|fallback| panic!("transform: {}", fallback.error));

	assert_eq!(
		document.output,
		"---\ntitle: Install\ndescription: Read the setup guide.\n---\n\nRead the [setup \
		 guide](/sdk/1.0/guides/setup).\n\n<Note>\nRemember this.\n</Note>\n"
	);
	assert!(document.location_sensitive);
	assert!(document.version_sensitive);
	assert!(document.issues.is_empty());
}

#[tokio::test]
async fn transform_output_is_stable() {
	let options = MigrationOptions::new("src", "out", "sdk");
	let versions = vec!["1.0".to_string()];
	let transformer = Transformer::new(&options, &versions, &OfflineFetcher);
	let raw = "# Title\n\nArrows -> here.\n\n<!-- note -->\n\n| a | {b} |\n| - | - |\n";
	let first = transformer
		.transform(&source("page.md", raw))
		.await
		.unwrap_or_else(|fallback| panic!("transform: {}", fallback.error));
	let second = transformer
		.transform(&source("page.md", raw))
		.await
		.unwrap_or_else(|fallback| panic!("transform: {}", fallback.error));

	assert_eq!(first, second);
	assert!(first.output.ends_with('\n'));
	assert!(!first.output.ends_with("\n\n"));
}

#[tokio::test]
async fn body_issue_lines_are_relative_to_the_source_file() {
	let options = MigrationOptions::new("src", "out", "sdk");
	let versions = vec!["1.0".to_string()];
	let transformer = Transformer::new(&options, &versions, &OfflineFetcher);
	let raw = "---\ntitle: X\n---\n\nText.\n\n</Card>\n";
	let document = transformer
		.transform(&source("x.md", raw))
		.await
		.unwrap_or_else(|fallback| panic!("transform: {}", fallback.error));

	assert_eq!(document.issues.len(), 1);
	assert_eq!(document.issues[0].line, Some(7));
}

#[tokio::test]
async fn oversized_documents_fall_back_to_the_original_text() {
	let mut options = MigrationOptions::new("src", "out", "sdk");
	options.max_file_size = 10;
	let versions = vec!["1.0".to_string()];
	let transformer = Transformer::new(&options, &versions, &OfflineFetcher);
	let raw = "# A document longer than ten bytes\n";

	let Err(fallback) = transformer.transform(&source("big.md", raw)).await else {
		panic!("expected a fallback");
	};

	assert!(matches!(fallback.error, TransformError::TooLarge { .. }));
	assert_eq!(fallback.document.output, raw);
	assert_eq!(
		fallback.document.issues.last().map(|issue| issue.severity),
		Some(Severity::Error)
	);
}

// --- Cache tests ---

fn cached_document(location_sensitive: bool, version_sensitive: bool) -> TransformedDocument {
	TransformedDocument {
		output: "cached".to_string(),
		meta: parse_document("# Cached\n", "a.md", &mut Vec::new()).meta,
		issues: Vec::new(),
		location_sensitive,
		version_sensitive,
	}
}

#[rstest]
#[case::independent(false, false, "b.md", "2.0", true)]
#[case::same_location(true, true, "a.md", "1.0", true)]
#[case::other_path(true, false, "b.md", "1.0", false)]
#[case::other_path_same_version(false, true, "b.md", "1.0", true)]
#[case::other_version(false, true, "a.md", "2.0", false)]
#[case::other_version_location_only(true, false, "a.md", "2.0", true)]
fn cache_entries_are_reused_only_where_valid(
	#[case] location_sensitive: bool,
	#[case] version_sensitive: bool,
	#[case] path: &str,
	#[case] version: &str,
	#[case] expected: bool,
) {
	let entry = CacheEntry::new(
		cached_document(location_sensitive, version_sensitive),
		"1.0",
		"a.md",
	);

	assert_eq!(entry.reusable_for(path, version), expected);
}

#[test]
fn content_cache_is_write_once() {
	let mut cache = ContentCache::new();
	let hash = ContentHash::of("same text");
	let mut document = cached_document(false, false);
	document.output = "first".to_string();
	let mut second = document.clone();
	second.output = "second".to_string();

	assert!(cache.store(hash.clone(), CacheEntry::new(document, "1.0", "a.md")));
	assert!(!cache.store(hash.clone(), CacheEntry::new(second, "2.0", "a.md")));
	assert_eq!(cache.len(), 1);
	assert_eq!(
		cache.lookup(&hash).map(|entry| entry.document.output.as_str()),
		Some("first")
	);
}

// --- Cross-link tests ---

#[test]
fn path_mapping_rewrites_exact_page_routes() {
	let mut mapping = PathMapping::new();
	mapping
		.insert("/sdk/1.0/guides/old", "/sdk/1.0/guides/new", "1.0/guides/old.md")
		.unwrap_or_else(|e| panic!("insert: {e:?}"));
	mapping
		.insert("/sdk/1.0/intro", "/sdk/1.0/intro", "1.0/intro.md")
		.unwrap_or_else(|e| panic!("insert: {e:?}"));

	assert_eq!(
		mapping.rewrite("/sdk/1.0/guides/old").as_deref(),
		Some("/sdk/1.0/guides/new")
	);
	assert_eq!(
		mapping.rewrite("/sdk/1.0/guides/old/").as_deref(),
		Some("/sdk/1.0/guides/new")
	);
	assert_eq!(mapping.rewrite("/sdk/1.0/guides/old/child"), None);
	assert_eq!(mapping.rewrite("/sdk/1.0/guides/older"), None);
	assert_eq!(mapping.rewrite("/sdk/1.0/intro"), None);
}

#[test]
fn renamed_pages_do_not_move_routes_below_them() {
	let mut mapping = PathMapping::new();
	mapping
		.insert("/sdk/1.0/guides", "/sdk/1.0/overview", "1.0/guides.md")
		.unwrap_or_else(|e| panic!("insert: {e:?}"));
	mapping
		.insert("/sdk/1.0/guides/setup", "/sdk/1.0/guides/setup", "1.0/guides/setup.md")
		.unwrap_or_else(|e| panic!("insert: {e:?}"));

	let (text, count) = rewrite_links(
		"[a](/sdk/1.0/guides) [b](/sdk/1.0/guides/setup) [c](/sdk/1.0/guides/missing)\n",
		&mapping,
	);

	assert_eq!(count, 1);
	assert_eq!(
		text,
		"[a](/sdk/1.0/overview) [b](/sdk/1.0/guides/setup) [c](/sdk/1.0/guides/missing)\n"
	);
}

#[test]
fn path_mapping_rejects_conflicts() {
	let mut mapping = PathMapping::new();
	mapping
		.insert("/sdk/1.0/intro", "/sdk/1.0/intro", "1.0/01-intro.md")
		.unwrap_or_else(|e| panic!("insert: {e:?}"));
	let conflict = mapping
		.insert("/sdk/1.0/intro", "/sdk/1.0/intro", "1.0/intro.md")
		.expect_err("duplicate route");

	assert_eq!(conflict.first, "1.0/01-intro.md");
	assert_eq!(conflict.second, "1.0/intro.md");
}

#[test]
fn rewrite_links_skips_code() {
	let mut mapping = PathMapping::new();
	mapping
		.insert("/sdk/1.0/old", "/sdk/1.0/new", "1.0/old.md")
		.unwrap_or_else(|e| panic!("insert: {e:?}"));
	let (text, count) = rewrite_links(
		"See [a](/sdk/1.0/old#top), <a href=\"/sdk/1.0/old\">b</a> and `[c](/sdk/1.0/old)`.\n\n[d]: \
		 /sdk/1.0/old\n",
		&mapping,
	);

	assert_eq!(count, 3);
	assert_eq!(
		text,
		"See [a](/sdk/1.0/new#top), <a href=\"/sdk/1.0/new\">b</a> and `[c](/sdk/1.0/old)`.\n\n[d]: \
		 /sdk/1.0/new\n"
	);
}

// --- Navigation tests ---

#[test]
fn duplicate_ordering_hints_get_distinct_positions() {
	let positions = assign_positions(&[(Some(1), "a.md"), (Some(1), "b.md"), (Some(2), "c.md")]);

	assert_eq!(positions, vec![(0, 1), (1, 2), (2, 3)]);
}

#[test]
fn tied_maximum_hints_do_not_overflow() {
	let positions = assign_positions(&[
		(Some(i64::MAX), "a.md"),
		(Some(i64::MAX), "b.md"),
		(None, "c.md"),
	]);

	assert_eq!(
		positions,
		vec![(0, i64::MAX - 3), (1, i64::MAX - 2), (2, i64::MAX - 1)]
	);
}

#[test]
fn unhinted_items_follow_hinted_ones() {
	let positions = assign_positions(&[(None, "a.md"), (Some(5), "b.md"), (None, "c.md")]);

	assert_eq!(positions, vec![(1, 5), (0, 6), (2, 7)]);
}

#[test]
fn builds_grouped_navigation() {
	let entries = vec![
		NavEntry {
			source_path: "intro.md".to_string(),
			route: "intro".to_string(),
			ordering: Some(1),
		},
		NavEntry {
			source_path: "guides/setup.md".to_string(),
			route: "guides/setup".to_string(),
			ordering: None,
		},
		NavEntry {
			source_path: "guides/advanced.md".to_string(),
			route: "guides/advanced".to_string(),
			ordering: Some(1),
		},
		NavEntry {
			source_path: "03-api/client.md".to_string(),
			route: "api/client".to_string(),
			ordering: None,
		},
	];
	let mut categories = BTreeMap::new();
	categories.insert(
		"guides".to_string(),
		CategoryMeta {
			label: Some("User Guides".to_string()),
			position: Some(2),
		},
	);

	let navigation = build_version_navigation("sdk", "1.0", &entries, &categories);

	assert_eq!(
		navigation.pages,
		vec![
			NavigationNode::Page("sdk/1.0/intro".to_string()),
			NavigationNode::Group {
				group: "User Guides".to_string(),
				pages: vec![
					NavigationNode::Page("sdk/1.0/guides/advanced".to_string()),
					NavigationNode::Page("sdk/1.0/guides/setup".to_string()),
				],
			},
			NavigationNode::Group {
				group: "Api".to_string(),
				pages: vec![NavigationNode::Page("sdk/1.0/api/client".to_string())],
			},
		]
	);
}

#[test]
fn parses_category_metadata() -> Result<(), serde_json::Error> {
	let meta = CategoryMeta::parse("{\"label\": \" Guides \", \"position\": 2.5, \"link\": null}")?;

	assert_eq!(meta.label.as_deref(), Some("Guides"));
	assert_eq!(meta.position, Some(2));

	Ok(())
}

// --- Issue tests ---

#[test]
fn reporter_deduplicates_and_groups() {
	let mut reporter = IssueReporter::new();
	reporter.set_current_file("1.0/a.md");
	assert!(reporter.record(DocumentIssue::error("broken").at_line(2)));
	assert!(!reporter.record(DocumentIssue::error("broken").at_line(2)));
	reporter.record(DocumentIssue::warning("odd").with_suggestion("fix it"));
	reporter.record_for("2.0/a.md", DocumentIssue::error("broken").at_line(2));

	assert_eq!(reporter.issues().len(), 3);
	assert_eq!(reporter.count(Severity::Error), 2);
	assert!(reporter.has_errors());

	let report = reporter.generate_report();
	assert!(report.contains("Errors (2)"));
	assert!(report.contains("Warnings (1)"));
	assert!(report.contains("  - line 2: broken"));
	assert!(report.contains("    suggestion: fix it"));
	assert!(report.contains("Summary: 2 error(s), 1 warning(s), 0 info across 2 file(s)."));
}

#[test]
fn empty_report_says_so() {
	assert!(render_report(&[]).contains("No issues found."));
}

// --- Config tests ---

#[test]
fn loads_config_file() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(
		tmp.path(),
		"docshift.toml",
		"product = \"sdk\"\noutput = \"site\"\nversions = [\"1.0\"]\n\n[exclude]\npatterns = \
		 [\"drafts/\"]\n\n[fetch]\nenabled = true\ntimeout_secs = 3\n",
	);

	let config = DocshiftConfig::load(tmp.path())?.unwrap_or_else(|| panic!("config not found"));
	let options = MigrationOptions::from_config(tmp.path(), Some(&config), None, None);

	assert_eq!(options.product, "sdk");
	assert_eq!(options.output_dir, tmp.path().join("site"));
	assert_eq!(options.versions, vec!["1.0".to_string()]);
	assert_eq!(options.exclude_patterns, vec!["drafts/".to_string()]);
	assert!(options.fetch_references);
	assert_eq!(options.fetch_timeout.as_secs(), 3);
	assert_eq!(options.max_comment_length, DEFAULT_MAX_COMMENT_LENGTH);

	Ok(())
}

#[test]
fn arguments_override_config() {
	let config = DocshiftConfig {
		product: Some("from-config".to_string()),
		..DocshiftConfig::default()
	};
	let options = MigrationOptions::from_config(
		"docs",
		Some(&config),
		Some("cli".to_string()),
		Some("site".into()),
	);

	assert_eq!(options.product, "cli");
	assert_eq!(options.output_dir, PathBuf::from("site"));
}

#[test]
fn invalid_config_is_a_parse_error() {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "docshift.toml", "product = [\n");

	assert!(matches!(
		DocshiftConfig::load(tmp.path()),
		Err(DocshiftError::ConfigParse(_))
	));
}

#[rstest]
#[case::empty("")]
#[case::blank("   ")]
fn blank_product_is_rejected(#[case] product: &str) {
	let options = MigrationOptions::new("src", "out", product);

	assert!(matches!(options.validate(), Err(DocshiftError::MissingProduct)));
}

#[test]
fn product_with_separator_is_rejected() {
	let options = MigrationOptions::new("src", "out", "a/b");

	assert!(matches!(
		options.validate(),
		Err(DocshiftError::InvalidProduct(_))
	));
}

// --- Migration tests ---

#[tokio::test]
async fn identical_documents_are_transformed_once() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let content = "---\ntitle: Guide\n---\n\nSame content in every version.\n";
	write_source(tmp.path(), "src/1.0/guide.md", content);
	write_source(tmp.path(), "src/2.0/guide.md", content);

	let summary = migrate(&migration_options(tmp.path())).await?;

	assert_eq!(summary.versions, vec!["1.0".to_string(), "2.0".to_string()]);
	assert_eq!(summary.stats.transformed, 1);
	assert_eq!(summary.stats.cache_hits, 1);
	let first = read_output(&tmp.path().join("out/sdk/1.0/guide.mdx"));
	let second = read_output(&tmp.path().join("out/sdk/2.0/guide.mdx"));
	assert_eq!(first, second);

	Ok(())
}

#[tokio::test]
async fn version_namespaced_documents_are_transformed_per_version() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let content = "---\ntitle: Guide\n---\n\nSee [other](./other.md).\n";
	write_source(tmp.path(), "src/1.0/guide.md", content);
	write_source(tmp.path(), "src/2.0/guide.md", content);

	let summary = migrate(&migration_options(tmp.path())).await?;

	assert_eq!(summary.stats.transformed, 2);
	assert_eq!(summary.stats.cache_hits, 0);
	let first = read_output(&tmp.path().join("out/sdk/1.0/guide.mdx"));
	let second = read_output(&tmp.path().join("out/sdk/2.0/guide.mdx"));
	assert!(first.contains("(/sdk/1.0/other)"));
	assert!(second.contains("(/sdk/2.0/other)"));

	Ok(())
}

#[tokio::test]
async fn reused_documents_match_a_fresh_transform() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let content = "---\ntitle: API\n---\n\nBack to [v1](/sdk/1.0/intro).\n\n```bash\ncurl \
	               https://host/sdk/1.0/users\n```\n";
	write_source(tmp.path(), "src/1.0/api.md", content);
	write_source(tmp.path(), "src/2.0/api.md", content);

	let options = migration_options(tmp.path());
	let summary = migrate(&options).await?;

	assert_eq!(summary.stats.transformed, 1);
	assert_eq!(summary.stats.cache_hits, 1);

	let versions = known_versions();
	let fresh = Transformer::new(&options, &versions, &OfflineFetcher)
		.transform(&SourceDocument {
			path: "api.md".to_string(),
			version: "2.0".to_string(),
			product: "sdk".to_string(),
			raw: content.to_string(),
		})
		.await
		.unwrap_or_else(|fallback| panic!("transform: {}", fallback.error));
	let reused = read_output(&tmp.path().join("out/sdk/2.0/api.mdx"));

	assert_eq!(reused, fresh.output);
	assert!(reused.contains("[v1](/sdk/1.0/intro)"));
	assert!(reused.contains("curl https://host/sdk/1.0/users"));

	Ok(())
}

#[tokio::test]
async fn location_sensitive_documents_are_not_shared_across_paths() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let content = "---\ntitle: Page\n---\n\nSee [x](./x.md).\n";
	write_source(tmp.path(), "src/1.0/a.md", content);
	write_source(tmp.path(), "src/1.0/b/c.md", content);

	let summary = migrate(&migration_options(tmp.path())).await?;

	assert_eq!(summary.stats.transformed, 2);
	assert_eq!(summary.stats.cache_hits, 0);
	let nested = read_output(&tmp.path().join("out/sdk/1.0/b/c.mdx"));
	assert!(nested.contains("(/sdk/1.0/b/x)"));

	Ok(())
}

#[tokio::test]
async fn relative_links_resolve_against_the_source_directory() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(
		tmp.path(),
		"src/1.0/a/b/page.md",
		"---\ntitle: Page\n---\n\nGo to [Sibling](../sibling.md).\n",
	);
	write_source(tmp.path(), "src/1.0/a/sibling.md", "# Sibling\n");

	migrate(&migration_options(tmp.path())).await?;

	let page = read_output(&tmp.path().join("out/sdk/1.0/a/b/page.mdx"));
	assert!(page.contains("[Sibling](/sdk/1.0/a/sibling)"));
	assert!(tmp.path().join("out/sdk/1.0/a/sibling.mdx").is_file());

	Ok(())
}

#[tokio::test]
async fn ordering_prefixes_are_stripped_from_files_and_links() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/02-guides/01-start.md", "# Start\n");
	write_source(
		tmp.path(),
		"src/1.0/intro.md",
		"# Intro\n\nBegin with [Start](./02-guides/01-start.md).\n",
	);

	migrate(&migration_options(tmp.path())).await?;

	assert!(tmp.path().join("out/sdk/1.0/guides/start.mdx").is_file());
	let intro = read_output(&tmp.path().join("out/sdk/1.0/intro.mdx"));
	assert!(intro.contains("[Start](/sdk/1.0/guides/start)"));

	Ok(())
}

#[tokio::test]
async fn renamed_routes_are_rewritten_in_other_documents() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(
		tmp.path(),
		"src/1.0/old.md",
		"---\ntitle: Old\nslug: renamed\n---\n\nOld page body text.\n",
	);
	write_source(
		tmp.path(),
		"src/1.0/intro.md",
		"---\ntitle: Intro\n---\n\nSee [Old](./old.md).\n",
	);

	let summary = migrate(&migration_options(tmp.path())).await?;

	assert_eq!(summary.stats.links_rewritten, 1);
	assert!(tmp.path().join("out/sdk/1.0/renamed.mdx").is_file());
	assert!(!tmp.path().join("out/sdk/1.0/old.mdx").exists());
	let intro = read_output(&tmp.path().join("out/sdk/1.0/intro.mdx"));
	assert!(intro.contains("[Old](/sdk/1.0/renamed)"));

	Ok(())
}

#[tokio::test]
async fn navigation_positions_are_distinct() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/c.md", "---\ntitle: C\nsidebar_position: 2\n---\n");
	write_source(tmp.path(), "src/1.0/b.md", "---\ntitle: B\nsidebar_position: 1\n---\n");
	write_source(tmp.path(), "src/1.0/a.md", "---\ntitle: A\nsidebar_position: 1\n---\n");
	let mut options = migration_options(tmp.path());
	options.update_navigation = true;

	let summary = migrate(&options).await?;

	let navigation = summary.navigation.unwrap_or_else(|| panic!("navigation missing"));
	assert_eq!(
		navigation.versions[0].pages,
		vec![
			NavigationNode::Page("sdk/1.0/a".to_string()),
			NavigationNode::Page("sdk/1.0/b".to_string()),
			NavigationNode::Page("sdk/1.0/c".to_string()),
		]
	);
	let written = read_output(&tmp.path().join("out").join(NAVIGATION_FILE));
	assert!(written.contains("\"sdk/1.0/a\""));

	Ok(())
}

#[tokio::test]
async fn category_files_label_and_order_groups() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/intro.md", "---\ntitle: Intro\nsidebar_position: 2\n---\n");
	write_source(tmp.path(), "src/1.0/guides/setup.md", "---\ntitle: Setup\n---\n");
	write_source(
		tmp.path(),
		"src/1.0/guides/_category_.json",
		"{\"label\": \"User Guides\", \"position\": 1}",
	);
	let mut options = migration_options(tmp.path());
	options.update_navigation = true;

	let summary = migrate(&options).await?;

	let navigation = summary.navigation.unwrap_or_else(|| panic!("navigation missing"));
	assert_eq!(
		navigation.versions[0].pages,
		vec![
			NavigationNode::Group {
				group: "User Guides".to_string(),
				pages: vec![NavigationNode::Page("sdk/1.0/guides/setup".to_string())],
			},
			NavigationNode::Page("sdk/1.0/intro".to_string()),
		]
	);

	Ok(())
}

#[tokio::test]
async fn unclosed_disclosure_is_closed_and_reported() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(
		tmp.path(),
		"src/1.0/x.md",
		"---\ntitle: X\n---\n\n<details>\n<summary>Open</summary>\n\nBody text.\n",
	);

	let summary = migrate(&migration_options(tmp.path())).await?;

	let output = read_output(&tmp.path().join("out/sdk/1.0/x.mdx"));
	assert!(output.contains("<Accordion title=\"Open\">"));
	assert!(output.contains("</Accordion>"));
	assert!(summary.issues.iter().any(|issue| {
		issue.file == "1.0/x.md"
			&& issue.severity == Severity::Warning
			&& issue.message.contains("never closed")
	}));

	Ok(())
}

#[tokio::test]
async fn blank_product_aborts_before_writing() {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/intro.md", "# Intro\n");
	let mut options = migration_options(tmp.path());
	options.product = "  ".to_string();

	let result = migrate(&options).await;

	assert!(matches!(result, Err(DocshiftError::MissingProduct)));
	assert!(!tmp.path().join("out").exists());
}

#[tokio::test]
async fn missing_source_root_aborts() {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let result = migrate(&migration_options(tmp.path())).await;

	assert!(matches!(result, Err(DocshiftError::SourceRoot { .. })));
	assert!(!tmp.path().join("out").exists());
}

#[tokio::test]
async fn missing_configured_version_aborts() {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/intro.md", "# Intro\n");
	let mut options = migration_options(tmp.path());
	options.versions = vec!["9.9".to_string()];

	let result = migrate(&options).await;

	assert!(matches!(result, Err(DocshiftError::MissingVersion { .. })));
}

#[tokio::test]
async fn source_without_versions_aborts() {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/intro.md", "# Intro\n");

	let result = migrate(&migration_options(tmp.path())).await;

	assert!(matches!(result, Err(DocshiftError::NoVersions(_))));
}

#[tokio::test]
async fn version_discovery_skips_the_output_directory() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let src = tmp.path().join("src");
	write_source(&src, "version-1.0/intro.md", "# Intro\n");
	write_source(&src, "migrated/sdk/1.0/intro.mdx", "old output\n");
	write_source(&src, ".git/HEAD", "ref\n");
	let options = MigrationOptions::from_config(&src, None, Some("sdk".to_string()), None);

	let versions = discover_versions(&options).await?;

	assert_eq!(versions.len(), 1);
	assert_eq!(versions[0].label, "1.0");
	assert_eq!(versions[0].directory, src.join("version-1.0"));

	Ok(())
}

#[tokio::test]
async fn dry_run_writes_nothing() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/intro.md", "# Intro\n");
	let mut options = migration_options(tmp.path());
	options.dry_run = true;
	options.update_navigation = true;

	let summary = migrate(&options).await?;

	assert!(!tmp.path().join("out").exists());
	assert_eq!(summary.stats.written, 0);
	assert_eq!(summary.pages.len(), 1);
	assert!(summary.navigation.is_some());

	Ok(())
}

#[tokio::test]
async fn staging_writes_to_the_staging_directory() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/intro.md", "# Intro\n");
	let mut options = migration_options(tmp.path());
	options.staging = true;

	let summary = migrate(&options).await?;

	assert_eq!(summary.output_root, tmp.path().join("out.staging"));
	assert!(tmp.path().join("out.staging/sdk/1.0/intro.mdx").is_file());
	assert!(!tmp.path().join("out").exists());

	Ok(())
}

#[tokio::test]
async fn excluded_paths_are_skipped() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/intro.md", "# Intro\n");
	write_source(tmp.path(), "src/1.0/drafts/wip.md", "# Work in progress\n");
	write_source(tmp.path(), "src/1.0/node_modules/pkg/readme.md", "# Package\n");
	let mut options = migration_options(tmp.path());
	options.exclude_patterns = vec!["drafts/".to_string()];

	let summary = migrate(&options).await?;

	assert_eq!(summary.stats.documents, 1);
	assert!(summary.page("1.0", "intro.md").is_some());
	assert!(summary.page("1.0", "drafts/wip.md").is_none());

	Ok(())
}

#[tokio::test]
async fn conflicting_routes_keep_the_first_document() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/01-intro.md", "# First\n");
	write_source(tmp.path(), "src/1.0/intro.md", "# Second\n");

	let summary = migrate(&migration_options(tmp.path())).await?;

	assert_eq!(summary.stats.skipped, 1);
	assert!(summary.has_errors());
	let output = read_output(&tmp.path().join("out/sdk/1.0/intro.mdx"));
	assert!(output.contains("title: First"));

	Ok(())
}

#[tokio::test]
async fn assets_are_copied_once_with_first_copy_winning() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_source(tmp.path(), "src/1.0/img/logo.png", "first");
	write_source(tmp.path(), "src/2.0/img/logo.png", "second");
	write_source(tmp.path(), "src/1.0/intro.md", "# Intro\n\n![Logo](./img/logo.png)\n");

	let summary = migrate(&migration_options(tmp.path())).await?;

	assert_eq!(summary.stats.assets_copied, 1);
	assert_eq!(read_output(&tmp.path().join("out/images/img/logo.png")), "first");
	let intro = read_output(&tmp.path().join("out/sdk/1.0/intro.mdx"));
	assert!(intro.contains("![Logo](/images/img/logo.png)"));
	assert!(
		summary
			.issues
			.iter()
			.any(|issue| issue.file == "2.0/img/logo.png" && issue.severity == Severity::Warning)
	);

	Ok(())
}

#[tokio::test]
async fn untransformable_documents_are_copied_and_reported() -> DocshiftResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let raw = "# A document longer than the limit\n";
	write_source(tmp.path(), "src/1.0/big.md", raw);
	write_source(tmp.path(), "src/1.0/small.md", "ok\n");
	let mut options = migration_options(tmp.path());
	options.max_file_size = 20;

	let summary = migrate(&options).await?;

	assert_eq!(summary.stats.fallbacks, 1);
	assert_eq!(read_output(&tmp.path().join("out/sdk/1.0/big.mdx")), raw);
	assert!(tmp.path().join("out/sdk/1.0/small.mdx").is_file());
	assert!(summary.has_errors());

	Ok(())
}
