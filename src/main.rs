//! CLI entry point for macro-keymapper
//!
//! Provides command-line management of key mappings and a foreground
//! `run` mode that feeds key events from stdin into the engine.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use crossbeam_channel::{never, select, unbounded};
use macro_keymapper::api::{
    CreateMappingRequest, MacroService, MappingList, MappingView, UpdateMappingRequest,
};
use macro_keymapper::config::settings::resolve_config_dir;
use macro_keymapper::config::{watcher, EngineSettings, MappingFile, MappingFileWatcher};
use macro_keymapper::engine::input::{ChannelKeySource, DryRunInjector};
use macro_keymapper::engine::EngineController;
use macro_keymapper::store::MappingStore;
use macro_keymapper::Mapping;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "macro-keymapper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config directory (default: ~/.config/macro-keymapper)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all mappings with duplicate information
    List,

    /// Create a mapping
    Add {
        #[arg(short, long)]
        name: String,

        /// Trigger key: delete or end
        #[arg(short, long)]
        start_key: String,

        /// Sequence such as "1(100),ctrl+c(0)"
        #[arg(short, long)]
        keys: String,

        /// Enable right away, disabling other mappings on the same start key
        #[arg(long)]
        enable: bool,
    },

    /// Replace name, start key, and keys of a mapping
    Update {
        id: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        start_key: String,

        #[arg(short, long)]
        keys: String,
    },

    /// Delete a mapping
    Delete { id: String },

    /// Enable or disable a mapping
    Toggle { id: String },

    /// List the keys usable in sequences
    Keys,

    /// Show engine and mapping statistics
    Status,

    /// Run the engine; reads key events from stdin ("delete", "-delete" for key-up, "quit")
    Run {
        /// Reload mappings when the mapping file changes
        #[arg(long)]
        watch: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_dir = resolve_config_dir(cli.config_dir.as_deref());
    let settings = EngineSettings::load(&config_dir)
        .with_context(|| format!("Failed to load settings from {}", config_dir.display()))?;

    init_tracing(&settings.log_filter);

    let file = Arc::new(MappingFile::new(
        settings.mappings_path(&config_dir),
        settings.backups_to_keep,
    )?);

    let store = Arc::new(MappingStore::new(settings.duplicate_policy).with_sink(file.clone()));
    let repaired = store.replace_all(file.load()?);
    if repaired > 0 {
        println!(
            "{} Repaired {} mapping record{} on load",
            "⚠".yellow(),
            repaired,
            if repaired == 1 { "" } else { "s" }
        );
    }

    let source = Arc::new(ChannelKeySource::new());
    let engine = EngineController::new(
        Arc::clone(&store),
        source.clone(),
        Arc::new(DryRunInjector::new()),
        settings.retrigger_policy,
    );
    let service = MacroService::new(store, engine, settings.default_delay_ms);

    match cli.command {
        Commands::List => print_mappings(&service.list_mappings()),
        Commands::Add {
            name,
            start_key,
            keys,
            enable,
        } => {
            let mapping = service.create_mapping(&CreateMappingRequest {
                name,
                start_key,
                key_sequence: keys,
                enabled: enable,
            })?;
            report("Created", &mapping);
        }
        Commands::Update {
            id,
            name,
            start_key,
            keys,
        } => {
            let mapping = service.update_mapping(
                &id,
                &UpdateMappingRequest {
                    name,
                    start_key,
                    key_sequence: keys,
                },
            )?;
            report("Updated", &mapping);
        }
        Commands::Delete { id } => {
            let mapping = service.delete_mapping(&id)?;
            report("Deleted", &mapping);
        }
        Commands::Toggle { id } => {
            let mapping = service.toggle_mapping(&id)?;
            report(if mapping.enabled { "Enabled" } else { "Disabled" }, &mapping);
        }
        Commands::Keys => print_keys(&service),
        Commands::Status => print_status(&service),
        Commands::Run { watch } => run_engine(&service, &source, &file, watch)?,
    }

    Ok(())
}

/// RUST_LOG wins over the configured filter
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn report(action: &str, mapping: &Mapping) {
    println!("{} {} {}", "✓".green(), action, mapping);
    println!("  {}", format!("id: {}", mapping.id).dimmed());
}

fn print_mapping(view: &MappingView) {
    let mapping = &view.mapping;
    let marker = if mapping.enabled {
        "●".green()
    } else {
        "○".dimmed()
    };

    let mut line = format!(
        "{} {} {} → {}",
        marker,
        mapping.name.bold(),
        format!("[{}]", mapping.start_key).cyan(),
        view.key_sequence
    );
    if view.is_duplicate {
        line.push_str(&format!(
            " {}",
            format!("(duplicate {}/{})", view.duplicate_index + 1, view.total_duplicates).yellow()
        ));
    }

    println!("{}", line);
    println!("  {}", mapping.id.to_string().dimmed());
}

fn print_mappings(list: &MappingList) {
    if list.mappings.is_empty() {
        println!("{}", "No mappings defined".yellow());
        return;
    }

    for view in &list.mappings {
        print_mapping(view);
    }

    println!(
        "\n{} Total: {} ({} enabled, {} disabled)",
        "✓".green(),
        list.stats.total,
        list.stats.enabled,
        list.stats.disabled
    );

    for (start_key, info) in &list.duplicate_info {
        let active = info.active.as_deref().unwrap_or("none");
        println!(
            "{} {} is shared by {} mappings, active: {}",
            "⚠".yellow(),
            format!("[{}]", start_key).cyan(),
            info.count,
            active.bold()
        );
    }
}

fn print_keys(service: &MacroService) {
    for category in service.available_keys() {
        println!("{}", category.name.bold());
        println!("  {}", category.keys.join(" "));
    }
    println!(
        "\n{} Combinations: {}",
        "→".cyan(),
        "ctrl+c, shift+alt+tab, cmd+space".dimmed()
    );
}

fn print_status(service: &MacroService) {
    let status = service.engine_status();
    let state = if status.running {
        "running".green().bold()
    } else {
        "stopped".red().bold()
    };

    println!("Engine: {}", state);
    println!(
        "Mappings: {} total, {} enabled, {} start key{} with duplicates",
        status.stats.total,
        status.stats.enabled,
        status.stats.duplicate_keys,
        if status.stats.duplicate_keys == 1 { "" } else { "s" }
    );

    let counters = status.counters;
    println!(
        "Runs: {} started, {} completed, {} cancelled, {} ignored (busy), {} injection failures",
        counters.runs_started,
        counters.runs_completed,
        counters.runs_cancelled,
        counters.ignored_busy,
        counters.injection_failures
    );
}

/// Feeds stdin lines into the engine until EOF or `quit`.
fn run_engine(
    service: &MacroService,
    source: &ChannelKeySource,
    file: &MappingFile,
    watch: bool,
) -> anyhow::Result<()> {
    service.control_engine("start")?;
    println!(
        "{} Engine running (dry run). Type a key per line, {} for key-up, {} to stop.",
        "→".cyan(),
        "-key".bold(),
        "quit".bold()
    );

    let file_watcher = if watch {
        Some(MappingFileWatcher::new(file.path())?)
    } else {
        None
    };
    let file_events = file_watcher
        .as_ref()
        .map(|w| w.events().clone())
        .unwrap_or_else(never);

    let (line_tx, line_rx) = unbounded::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        select! {
            recv(line_rx) -> line => {
                let Ok(line) = line else { break };
                let token = line.trim();
                if token.is_empty() {
                    continue;
                }
                if token.eq_ignore_ascii_case("quit") {
                    break;
                }
                match token.strip_prefix('-') {
                    Some(key) => source.key_up(key),
                    None => source.key_down(token),
                };
            },
            recv(file_events) -> event => {
                let (Some(w), Ok(Ok(event))) = (file_watcher.as_ref(), event) else { continue };
                if !w.is_relevant(&event) {
                    continue;
                }
                match watcher::reload(file, service.store()) {
                    Ok(repaired) => println!(
                        "{} Mappings reloaded ({} repaired)",
                        "↻".cyan(),
                        repaired
                    ),
                    // Often a half-written file; the next event retries
                    Err(e) => warn!(error = %e, "reload failed, keeping current mappings"),
                }
            },
        }
    }

    service.control_engine("stop")?;
    print_status(service);
    Ok(())
}
