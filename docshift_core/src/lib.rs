//! `docshift_core` is the engine behind the `docshift` command. It moves a
//! versioned Docusaurus-style documentation tree into the MDX layout of a
//! Mintlify-style site: every document is parsed, its links are made absolute
//! under `/<product>/<version>/`, unsupported markup is converted to
//! components, and the result is written to
//! `<output>/<product>/<version>/<route>.mdx`.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source tree (one directory per version)
//!   -> Version discovery and file walk (exclude patterns, hidden files skipped)
//!   -> Content cache (identical documents are transformed once)
//!   -> Front matter extraction (title, description, slug, ordering)
//!   -> Markdown tree passes (links, raw html, code blocks)
//!   -> Text repairs (admonitions, tables, template tokens, tag balancing)
//!   -> Write + path mapping
//!   -> Cross-link pass (links to documents whose route changed)
//!   -> Navigation and issue report
//! ```
//!
//! ## Modules
//!
//! - [`config`]: `docshift.toml` loading and the per-run [`MigrationOptions`].
//! - [`tree`]: a markdown tree that re-renders only the nodes a pass touched.
//! - [`protect`]: placeholders that keep code out of text-level rewrites.
//! - [`links`], [`markup`], [`repair`]: the individual transformation passes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift_core::MigrationOptions;
//! use docshift_core::migrate;
//!
//! # async fn run() -> docshift_core::DocshiftResult<()> {
//! let mut options = MigrationOptions::new("docs", "site", "sdk");
//! options.update_navigation = true;
//!
//! let summary = migrate(&options).await?;
//! println!("{}", summary.report);
//! # Ok(())
//! # }
//! ```

pub use cache::*;
pub use codeblocks::*;
pub use config::*;
pub use crosslinks::*;
pub use error::*;
pub use frontmatter::*;
pub use issues::*;
pub use migrate::*;
pub use navigation::*;
pub use transform::*;

mod cache;
mod codeblocks;
pub mod config;
mod crosslinks;
mod error;
mod frontmatter;
mod issues;
pub mod links;
pub mod markup;
mod migrate;
mod navigation;
pub mod paths;
pub mod protect;
pub mod repair;
mod transform;
pub mod tree;

#[cfg(test)]
mod __tests;
