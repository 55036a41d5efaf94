use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Move a versioned Docusaurus-style docs tree to an MDX documentation site.",
	long_about = "docshift migrates a documentation tree with one directory per version into the \
	              MDX layout of a Mintlify-style site.\n\nLinks are made absolute under \
	              /<product>/<version>/, unsupported markup is converted to components, and every \
	              problem is collected in a report.\n\nQuick start:\n  docshift init      \
	              Create a docshift.toml in the source directory\n  docshift migrate   Run the \
	              migration"
)]
pub struct DocshiftCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Log progress to stderr. `DOCSHIFT_LOG` overrides the level.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a sample `docshift.toml` in the source directory.
	///
	/// If the file already exists, this command is a no-op and exits
	/// successfully.
	Init {
		/// Source directory holding one subdirectory per version. Defaults to
		/// the current directory.
		#[arg(long, short)]
		source: Option<PathBuf>,
	},
	/// Migrate every version of the source tree.
	///
	/// Reads `docshift.toml` from the source directory when present; flags
	/// take precedence over the file. Problems found in individual documents
	/// are reported and never stop the run. Exits with status 1 only when the
	/// run could not start, for example without a product label.
	Migrate(MigrateArgs),
}

#[derive(Args, Clone, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct MigrateArgs {
	/// Source directory holding one subdirectory per version. Defaults to the
	/// current directory.
	#[arg(long, short)]
	pub source: Option<PathBuf>,

	/// Product label, the first url segment of every migrated page.
	#[arg(long, short)]
	pub product: Option<String>,

	/// Output directory. Defaults to `migrated` inside the source directory.
	#[arg(long, short)]
	pub output: Option<PathBuf>,

	/// Process every document and print the report without writing files.
	#[arg(long, default_value_t = false)]
	pub dry_run: bool,

	/// Write to a staging directory instead of the output directory. Links
	/// still point at the final routes.
	#[arg(long, default_value_t = false)]
	pub staging: bool,

	/// Staging directory. Defaults to `<output>.staging`. Implies `--staging`.
	#[arg(long)]
	pub staging_dir: Option<PathBuf>,

	/// Write `navigation.json` to the output directory.
	#[arg(long, default_value_t = false)]
	pub navigation: bool,

	/// Fetch code referenced by `reference` code blocks over the network.
	#[arg(long, default_value_t = false)]
	pub fetch_references: bool,

	/// Output format for the run summary. Use `text` for the human-readable
	/// report or `json` for programmatic consumption.
	#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	#[default]
	Text,
	Json,
}
