//! CLI entry point for code-combiner

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use code_combiner::app::helpers::lock_state;
use code_combiner::app::{commands, AppState, SessionEvent, SessionOverrides};
use code_combiner::config::settings::{export_preferences, import_preferences};
use code_combiner::config::{JsonFileStore, PreferencesStore};
use code_combiner::core::{render_rows, visible_rows, OutputFormat, SelectionMode};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "code-combiner")]
#[command(about = "Pick files from a project tree and combine them into one document")]
#[command(version)]
struct Args {
    /// Project folder to open (defaults to the last opened folder)
    root: Option<PathBuf>,

    /// Where to write the combined document (remembered for next time)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Layout of the combined document (remembered for next time)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Number of files read in parallel (remembered for next time)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Start with everything unchecked and opt files in, for this run
    #[arg(long, conflicts_with = "normal")]
    reverse: bool,

    /// Start with everything checked, for this run
    #[arg(long)]
    normal: bool,

    /// Append a directory tree of the combined files, for this run
    #[arg(long, conflicts_with = "no_tree")]
    tree: bool,

    /// Leave the directory tree out, for this run
    #[arg(long = "no-tree")]
    no_tree: bool,

    /// Also hide entries matching a gitignore-style pattern, for this run
    /// (can be used multiple times)
    #[arg(short = 'I', long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Expand subdirectories N levels below the root
    #[arg(short, long, default_value = "0")]
    depth: usize,

    /// Expand a directory, relative to the root (can be used multiple times)
    #[arg(long, value_name = "REL")]
    expand: Vec<PathBuf>,

    /// Collapse a directory after expanding; its files stay selectable
    /// (can be used multiple times)
    #[arg(long, value_name = "REL")]
    collapse: Vec<PathBuf>,

    /// Check a file or directory (can be used multiple times)
    #[arg(long, value_name = "REL")]
    check: Vec<PathBuf>,

    /// Uncheck a file or directory (can be used multiple times)
    #[arg(long, value_name = "REL")]
    uncheck: Vec<PathBuf>,

    /// Include files with this extension (can be used multiple times)
    #[arg(long = "include-ext", value_name = "EXT")]
    include_ext: Vec<String>,

    /// Exclude files with this extension; remembered until included again
    /// (can be used multiple times)
    #[arg(long = "exclude-ext", value_name = "EXT")]
    exclude_ext: Vec<String>,

    /// Print the browsable tree with check marks, sizes and file kinds, then exit
    #[arg(long)]
    list: bool,

    /// Only list nodes whose name contains TEXT, plus their ancestors
    #[arg(long, value_name = "TEXT", requires = "list")]
    filter: Option<String>,

    /// Print the files that would be combined and exit
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Print a short preview of the combined document and exit
    #[arg(long)]
    preview: bool,

    /// Print the recent projects
    #[arg(long)]
    recent: bool,

    /// Forget the recent projects
    #[arg(long = "clear-recent")]
    clear_recent: bool,

    /// Write the preferences to FILE
    #[arg(long = "export-config", value_name = "FILE")]
    export_config: Option<PathBuf>,

    /// Replace the preferences with the ones in FILE
    #[arg(long = "import-config", value_name = "FILE")]
    import_config: Option<PathBuf>,

    /// Preferences file to use instead of the platform default
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> SessionOverrides {
        let mode = if self.reverse {
            Some(SelectionMode::ReverseIgnore)
        } else if self.normal {
            Some(SelectionMode::Normal)
        } else {
            None
        };
        let include_tree = if self.tree {
            Some(true)
        } else if self.no_tree {
            Some(false)
        } else {
            None
        };
        SessionOverrides {
            mode,
            include_tree,
            exclude_patterns: self.exclude.clone(),
        }
    }

    /// Whether the run only manages preferences.
    fn preferences_only(&self) -> bool {
        self.recent
            || self.clear_recent
            || self.export_config.is_some()
            || self.import_config.is_some()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let store = Arc::new(JsonFileStore::new(args.config.clone()));
    if let Some(location) = store.location() {
        tracing::debug!("Using preferences at {}", location.display());
    }

    let mut preferences = match &args.import_config {
        Some(path) => {
            let imported = import_preferences(path)?;
            store.save(&imported).context("Failed to save imported preferences")?;
            imported
        }
        None => store.load().context("Failed to load preferences")?,
    };

    if let Some(format) = args.format {
        preferences.output_format = format;
    }
    if let Some(workers) = args.workers {
        preferences.max_workers = workers;
    }
    if let Some(path) = &args.export_config {
        export_preferences(&preferences, path)?;
    }

    let state = Arc::new(std::sync::Mutex::new(
        AppState::new(preferences, store).with_overrides(args.overrides()),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();

    if args.clear_recent {
        commands::clear_recent_projects(tx.clone(), state.clone());
    }
    if args.recent {
        for project in &lock_state(&state).preferences.recent_projects {
            println!("{}", project.display());
        }
    }

    let root = match args.root.clone() {
        Some(root) => root,
        None if args.preferences_only() => return Ok(()),
        None => match lock_state(&state).preferences.last_folder.clone() {
            Some(last) => {
                tracing::info!("Reopening {}", last.display());
                last
            }
            None => bail!("No folder given and no previous folder to reopen"),
        },
    };

    commands::open_folder(&root, tx.clone(), state.clone())?;
    if lock_state(&state).mode() == SelectionMode::ReverseIgnore {
        tracing::info!("Reverse-ignore mode: everything starts unchecked");
    }

    let root_rel = Path::new("");
    if args.depth > 0 {
        commands::expand_recursive(root_rel, args.depth, tx.clone(), state.clone())?;
    }
    for dir in &args.expand {
        commands::expand(dir, tx.clone(), state.clone())?;
    }
    for dir in &args.collapse {
        commands::collapse(dir, tx.clone(), state.clone())?;
    }
    for ext in &args.exclude_ext {
        if !commands::set_extension_included(ext, false, tx.clone(), state.clone()) {
            tracing::warn!("No file with extension {:?} is loaded", ext);
        }
    }
    for ext in &args.include_ext {
        if !commands::set_extension_included(ext, true, tx.clone(), state.clone()) {
            tracing::warn!("No file with extension {:?} is loaded", ext);
        }
    }
    for path in &args.uncheck {
        commands::set_checked(path, false, tx.clone(), state.clone())?;
    }
    for path in &args.check {
        commands::set_checked(path, true, tx.clone(), state.clone())?;
    }

    // Setup commands only produce summaries and tree warnings.
    while let Ok(event) = rx.try_recv() {
        log_event(&event);
    }

    if args.list {
        let state_guard = lock_state(&state);
        if let Some(tree) = state_guard.tree.as_ref() {
            print!("{}", render_rows(&visible_rows(tree.root(), args.filter.as_deref())));
        }
        return Ok(());
    }

    if args.dry_run {
        for path in commands::resolve_selection(&state) {
            println!("{}", path.display());
        }
        return Ok(());
    }

    if args.preview {
        print!("{}", commands::preview_combine(&state).await?);
        return Ok(());
    }

    let cancel_state = state.clone();
    let cancel_proxy = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling");
            commands::cancel_combine(cancel_proxy, cancel_state);
        }
    });

    commands::start_combine(args.output, tx.clone(), state.clone())?;

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::CombineComplete(report) => {
                println!(
                    "Combined {} files ({} unreadable, {} bytes) into {}",
                    report.files,
                    report.failed,
                    report.bytes,
                    report.output.display()
                );
                return Ok(());
            }
            SessionEvent::CombineCancelled => bail!("Combine cancelled"),
            SessionEvent::Error(message) => bail!(message),
            other => log_event(&other),
        }
    }

    bail!("Session ended before the combine finished")
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::TreeWarning(warning) => tracing::warn!("{:?}", warning),
        SessionEvent::Progress(progress) => tracing::debug!(
            "[{}/{}] {}",
            progress.processed,
            progress.total,
            progress.current_file.display()
        ),
        SessionEvent::StateUpdate(summary) => tracing::debug!(
            "{} nodes loaded, {} files selected",
            summary.loaded_nodes,
            summary.selected_files
        ),
        other => tracing::debug!("{:?}", other),
    }
}
