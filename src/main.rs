//! # gitscope CLI
//!
//! Inspect a git repository at one revision, classify its files, and keep
//! the configuration files a Rego policy has something to say about.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gitscope snapshot <url>` | Export every file of a revision with language statistics |
//! | `gitscope filter <url>` | Export only the files kept by the rule set's policies |
//! | `gitscope classify <path>...` | Print the detected language of local files |
//! | `gitscope normalize <path>` | Print the normalized JSON of a local config file |
//!
//! ## Examples
//!
//! ```bash
//! gitscope snapshot https://github.com/org/app --rev v1.2.0 --dir deploy
//! gitscope filter https://github.com/org/app --rules rules.json --output out/
//! gitscope normalize ./Dockerfile
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

use gitscope::config::{self, Config};
use gitscope::export;
use gitscope::filter::{FilterEngine, FilterOptions};
use gitscope::language;
use gitscope::models::{RepositorySnapshot, SnapshotRequest, UNKNOWN_LANGUAGE};
use gitscope::normalize;
use gitscope::session::SessionStore;
use gitscope::snapshot::retrieve_snapshot;
use gitscope::vcs::GitRepository;
use gitscope::walker::PathMatch;

const DEFAULT_CONFIG_PATH: &str = "./config/gitscope.toml";

/// gitscope: repository snapshots filtered through Rego policies.
#[derive(Parser)]
#[command(name = "gitscope", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/gitscope.toml` when that file exists, otherwise
    /// built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log progress at info level.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Log at debug level.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Repository URL or local path.
    url: String,

    /// Revision to inspect (commit, branch, or tag). Defaults to HEAD.
    #[arg(long)]
    rev: Option<String>,

    /// Only include files whose path contains this fragment.
    #[arg(long)]
    dir: Option<String>,

    /// Match `--dir` against whole path segments instead of substrings.
    #[arg(long)]
    segment_match: bool,

    /// Output file, or a directory to receive a generated `<uuid>.json`.
    /// Writes to stdout when omitted.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve a snapshot and export every file.
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Retrieve a snapshot and export the files kept by the rules' policies.
    Filter {
        #[command(flatten)]
        source: SourceArgs,

        /// JSON rules file (`{"config": [...]}` or a bare array).
        /// Falls back to `[[rules]]` from the config file.
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Keep each file at most once, for the first rule that keeps it.
        #[arg(long)]
        dedupe: bool,
    },

    /// Print the detected language of local files.
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the normalized JSON of a local configuration file.
    Normalize { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let cfg = load_cli_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Snapshot { source } => {
            let snapshot = retrieve(&cfg, &source)?;
            emit(&snapshot, source.output.as_deref())?;
        }
        Commands::Filter {
            source,
            rules,
            dedupe,
        } => {
            let rules = match rules {
                Some(path) => config::load_rules(&path)?,
                None => cfg.rules.clone(),
            };
            if rules.is_empty() {
                bail!("No rules given: pass --rules or configure [[rules]]");
            }

            let engine = FilterEngine::from_config(&cfg)?.with_options(FilterOptions {
                dedupe: dedupe || cfg.filter.dedupe,
            });

            let store = SessionStore::new();
            let session = uuid::Uuid::new_v4().to_string();
            store.insert(&session, retrieve(&cfg, &source)?);
            let filtered = engine.filter_session(&store, &session, &rules)?;
            emit(&filtered, source.output.as_deref())?;
        }
        Commands::Classify { paths } => {
            for path in paths {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path.to_string_lossy();
                let label = language::classify(&name, &bytes).unwrap_or(UNKNOWN_LANGUAGE);
                println!("{}\t{}", path.display(), label);
            }
        }
        Commands::Normalize { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let value = normalize::normalize(&path.to_string_lossy(), &bytes)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn load_cli_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            config::load_config(Path::new(DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::default()),
    }
}

fn retrieve(cfg: &Config, source: &SourceArgs) -> anyhow::Result<RepositorySnapshot> {
    let repo = GitRepository::open_or_clone(
        &source.url,
        &cfg.repositories.cache_dir,
        cfg.repositories.fetch_on_open,
    )?;

    let mut request = SnapshotRequest::new(&source.url);
    if let Some(rev) = &source.rev {
        request = request.with_revision(rev);
    }
    if let Some(dir) = &source.dir {
        request = request.with_path_filter(dir);
    }

    let mut options = cfg.retrieve_options();
    if source.segment_match {
        options.walk.path_match = PathMatch::Segment;
    }

    Ok(retrieve_snapshot(&repo, &request, &options)?)
}

fn emit(snapshot: &RepositorySnapshot, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let written = export::export_to_path(snapshot, path)?;
            eprintln!(
                "Exported {} files to {}",
                snapshot.files.len(),
                written.display()
            );
        }
        None => {
            export::write_json(snapshot, std::io::stdout().lock())?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    debug!("Logging initialized at level: {}", level);
}
