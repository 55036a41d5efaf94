use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use clap::Parser;
use docshift_cli::Commands;
use docshift_cli::DocshiftCli;
use docshift_cli::MigrateArgs;
use docshift_cli::OutputFormat;
use docshift_core::AnyEmptyResult;
use docshift_core::CONFIG_FILE_CANDIDATES;
use docshift_core::DocshiftConfig;
use docshift_core::MigrationOptions;
use docshift_core::MigrationSummary;
use docshift_core::Severity;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "DOCSHIFT_LOG";

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = DocshiftCli::parse();

	// Respect NO_COLOR env var, --no-color flag and non-terminal stdout.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on_cached(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose);

	let result = match &args.command {
		Some(Commands::Init { source }) => run_init(source.clone()),
		Some(Commands::Migrate(migrate)) => run_migrate(migrate),
		None => {
			eprintln!("No subcommand specified. Run `docshift --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Render through miette for diagnostic codes and help text.
		match e.downcast::<docshift_core::DocshiftError>() {
			Ok(error) => {
				let report: miette::Report = (*error).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(1);
	}
}

/// Log to stderr so stdout only ever carries the report.
fn init_tracing(verbose: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_writer(std::io::stderr)
				.with_target(false),
		)
		.init();
}

fn resolve_source(source: Option<PathBuf>) -> PathBuf {
	source.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn run_init(source: Option<PathBuf>) -> AnyEmptyResult {
	let root = resolve_source(source);
	if let Some(existing) = DocshiftConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let config_path = root.join(CONFIG_FILE_CANDIDATES[0]);
	let sample_config = "# docshift configuration\n\n# Product label, the first url segment of \
	                     every migrated page.\nproduct = \"docs\"\n\n# Output directory, \
	                     relative to this file.\n# output = \"migrated\"\n\n# Version \
	                     directories to migrate, in order. Defaults to every \
	                     subdirectory.\n# versions = [\"1.0\", \"2.0\"]\n\n# Directory under \
	                     the output root for shared images.\n# assets_dir = \"images\"\n\n# \
	                     [exclude]\n# patterns = [\"drafts/\"]\n\n# [fetch]\n# enabled = \
	                     false\n# timeout_secs = 10\n\n# [markup]\n# max_comment_length = 500\n";

	std::fs::write(&config_path, sample_config)?;
	println!("Created {}", config_path.display());
	println!();
	println!("Next steps:");
	println!("  1. Set `product` in {}", config_path.display());
	println!("  2. Run `docshift migrate --dry-run` to preview the report");
	println!("  3. Run `docshift migrate` to write the site");

	Ok(())
}

fn migration_options(args: &MigrateArgs) -> Result<MigrationOptions, docshift_core::DocshiftError> {
	let source = resolve_source(args.source.clone());
	let config = DocshiftConfig::load(&source)?;
	let mut options = MigrationOptions::from_config(
		&source,
		config.as_ref(),
		args.product.clone(),
		args.output.clone(),
	);

	options.dry_run = args.dry_run;
	options.staging = args.staging || args.staging_dir.is_some();
	options.staging_dir.clone_from(&args.staging_dir);
	options.update_navigation |= args.navigation;
	options.fetch_references |= args.fetch_references;

	tracing::debug!(
		source = %options.source_root.display(),
		output = %options.output_root().display(),
		config = config.is_some(),
		"resolved migration options"
	);

	Ok(options)
}

fn run_migrate(args: &MigrateArgs) -> AnyEmptyResult {
	let options = migration_options(args)?;
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()?;
	let summary = runtime.block_on(docshift_core::migrate(&options))?;

	match args.format {
		OutputFormat::Text => print_summary(&summary),
		OutputFormat::Json => {
			let output = serde_json::json!({
				"output": summary.output_root.display().to_string(),
				"dryRun": summary.dry_run,
				"versions": summary.versions,
				"stats": summary.stats,
				"issues": summary.issues,
				"navigation": summary.navigation,
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
	}

	Ok(())
}

fn print_summary(summary: &MigrationSummary) {
	let stats = &summary.stats;
	let verb = if summary.dry_run {
		"Would migrate"
	} else {
		"Migrated"
	};
	let headline = format!(
		"{verb} {} document(s) across {} version(s) into {}",
		stats.documents - stats.skipped,
		stats.versions,
		summary.output_root.display()
	);
	println!("{}", colored!(headline, bold));
	println!(
		"  transformed: {}, reused: {}, fallbacks: {}, links rewritten: {}, assets: {}",
		stats.transformed,
		stats.cache_hits,
		stats.fallbacks,
		stats.links_rewritten,
		stats.assets_copied
	);
	if let Some(navigation) = &summary.navigation {
		println!("  navigation: {} version(s)", navigation.versions.len());
	}
	println!();
	print!("{}", summary.report);

	let errors = summary
		.issues
		.iter()
		.filter(|issue| issue.severity == Severity::Error)
		.count();
	let warnings = summary
		.issues
		.iter()
		.filter(|issue| issue.severity == Severity::Warning)
		.count();
	if errors > 0 {
		println!();
		println!(
			"{}",
			colored!(format!("{errors} document error(s) need manual review."), red)
		);
	} else if warnings > 0 {
		println!();
		println!(
			"{}",
			colored!(format!("{warnings} warning(s) to review."), yellow)
		);
	} else {
		println!();
		println!("{}", colored!("Migration completed cleanly.", green));
	}
}
