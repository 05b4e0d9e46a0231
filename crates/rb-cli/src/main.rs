//! RotBlock CLI
//!
//! CLI tool for managing filter settings and running the filtering engine
//! against saved page fixtures.

mod bench;
#[cfg(feature = "e2e")]
mod e2e;
mod fixture;
mod inspect;
mod store;

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use serde_json::Value;
use ts_rs::TS;

use rb_core::extract::{parse_duration, parse_view_count};
use rb_core::message::{Ack, RuntimeMessage};
use rb_core::store::{load_settings, save_settings};
use rb_core::{Config, Settings};

use crate::store::FileStore;

#[derive(Parser)]
#[command(name = "rb-cli")]
#[command(about = "RotBlock settings and filtering tools")]
struct Cli {
    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default settings
    Defaults,

    /// Parse view-count or duration text the way the engine does
    Parse {
        /// View-count text, e.g. "1.2K views"
        #[arg(long)]
        views: Option<String>,

        /// Duration badge text, e.g. "1:02:03"
        #[arg(long)]
        duration: Option<String>,
    },

    /// Read or write the settings store
    Settings {
        /// Settings store file
        #[arg(short, long, default_value = "rotblock-settings.json")]
        store: String,

        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run the engine over a page fixture with every item in view
    Inspect {
        /// Page fixture (JSON or saved HTML)
        #[arg(short, long)]
        page: String,

        /// Settings store file; defaults are used when omitted
        #[arg(short, long)]
        store: Option<String>,

        /// Override the fixture's page path, e.g. "/results"
        #[arg(long)]
        path: Option<String>,

        /// Emit a JSON report
        #[arg(long)]
        json: bool,
    },

    /// Benchmark extraction, decisions and full rescans
    Bench {
        /// Page fixture (JSON or saved HTML); a synthetic page is generated when omitted
        #[arg(short, long)]
        page: Option<String>,

        /// Items on the synthetic page
        #[arg(long, default_value_t = 500)]
        items: usize,

        #[arg(long, default_value_t = 100)]
        iterations: usize,

        #[arg(long, default_value_t = bench::DEFAULT_SEED)]
        seed: u32,
    },

    /// Export TypeScript bindings for the settings and message types
    Bindings {
        /// Output directory
        #[arg(short, long, default_value = "bindings")]
        output: String,
    },

    /// Run end-to-end checks against a real browser
    #[cfg(feature = "e2e")]
    E2e {
        #[arg(long, default_value = "http://localhost:9515")]
        chromedriver: String,

        /// Unpacked extension directory
        #[arg(long)]
        extension: String,

        #[arg(long)]
        headless: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the effective settings
    Show,

    /// Set one key; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },

    /// Clear the store back to defaults
    Reset,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    let result = match cli.command {
        Commands::Defaults => cmd_defaults(),
        Commands::Parse { views, duration } => cmd_parse(views.as_deref(), duration.as_deref()),
        Commands::Settings { store, action } => cmd_settings(&store, action),
        Commands::Inspect {
            page,
            store,
            path,
            json,
        } => cmd_inspect(page, store.as_deref(), path, json),
        Commands::Bench {
            page,
            items,
            iterations,
            seed,
        } => bench::run_bench(bench::BenchOptions {
            page_path: page,
            items,
            iterations,
            seed,
        }),
        Commands::Bindings { output } => cmd_bindings(&output),
        #[cfg(feature = "e2e")]
        Commands::E2e {
            chromedriver,
            extension,
            headless,
        } => e2e::run_e2e(e2e::E2eOptions {
            chromedriver_url: chromedriver,
            extension_path: extension,
            headless,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn cmd_defaults() -> Result<(), String> {
    print_json(&Settings::default())
}

fn cmd_parse(views: Option<&str>, duration: Option<&str>) -> Result<(), String> {
    if views.is_none() && duration.is_none() {
        return Err("Nothing to parse: pass --views and/or --duration".to_string());
    }
    if let Some(text) = views {
        match parse_view_count(text) {
            Some(count) => println!("views:    {}", count),
            None => println!("views:    unknown"),
        }
    }
    if let Some(text) = duration {
        match parse_duration(text) {
            Some(secs) => println!("duration: {}s", secs),
            None => println!("duration: unknown"),
        }
    }
    Ok(())
}

fn cmd_settings(path: &str, action: SettingsAction) -> Result<(), String> {
    let mut store = FileStore::open(path).map_err(|e| e.to_string())?;

    match action {
        SettingsAction::Show => {}
        SettingsAction::Set { key, value } => {
            let mut settings = load_settings(&store).map_err(|e| e.to_string())?;
            let mut entries = match serde_json::to_value(&settings) {
                Ok(Value::Object(entries)) => entries,
                _ => return Err("Settings did not encode to an object".to_string()),
            };
            if !entries.contains_key(&key) {
                let known: Vec<&str> = entries.keys().map(String::as_str).collect();
                return Err(format!("Unknown setting '{}' (expected one of: {})", key, known.join(", ")));
            }
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            entries.insert(key.clone(), value);
            settings = serde_json::from_value(Value::Object(entries))
                .map_err(|e| format!("Invalid value for '{}': {}", key, e))?;
            save_settings(&mut store, &settings).map_err(|e| e.to_string())?;
            println!("Updated '{}' in '{}'", key, store.path().display());
        }
        SettingsAction::Reset => {
            store.clear().map_err(|e| e.to_string())?;
            println!("Reset '{}' to defaults", store.path().display());
        }
    }

    let settings = load_settings(&store).map_err(|e| e.to_string())?;
    print_json(&settings)?;

    let config = Config::from(&settings);
    if !config.blocked_keywords.is_empty() {
        println!("Blocked keywords: {}", config.blocked_keywords.join(", "));
    }
    Ok(())
}

fn cmd_inspect(page: String, store: Option<&str>, path: Option<String>, json: bool) -> Result<(), String> {
    let settings = match store {
        Some(store_path) => {
            let store = FileStore::open(store_path).map_err(|e| e.to_string())?;
            rb_core::store::load_or_default(&store)
        }
        None => Settings::default(),
    };

    inspect::run_inspect(inspect::InspectOptions {
        page_path: page,
        url_path: path,
        settings,
        json,
    })
}

fn cmd_bindings(output: &str) -> Result<(), String> {
    let dir = Path::new(output);
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create '{}': {}", output, e))?;

    Settings::export_all_to(dir).map_err(|e| format!("Failed to export Settings: {}", e))?;
    RuntimeMessage::export_all_to(dir).map_err(|e| format!("Failed to export RuntimeMessage: {}", e))?;
    Ack::export_all_to(dir).map_err(|e| format!("Failed to export Ack: {}", e))?;

    println!("Exported TypeScript bindings to '{}'", output);
    Ok(())
}
