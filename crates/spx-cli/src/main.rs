//! 🚀 spx-cli — the front door, the bouncer, the maitre d' of spx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Thin wrapper: parse flags, set up logging, load config, run, print a receipt.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🧪 Generate fake column samples and push them into a search index.
#[derive(Debug, Parser)]
#[command(name = "spx", version, about)]
struct Cli {
    /// 📄 TOML config file. Missing file = env vars (SPX_*) only.
    #[arg(default_value = "spx.toml")]
    config: PathBuf,

    /// 🎯 override runtime.target_total_writes
    #[arg(long, env = "SPX_TARGET_TOTAL_WRITES")]
    target_total_writes: Option<u64>,

    /// 🎲 override generator.seed
    #[arg(long)]
    seed: Option<u64>,

    /// 📂 override runtime.input_file
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// 🙈 hide the progress panel
    #[arg(long)]
    no_progress: bool,
}

/// 🚀 main() — where it all begins. The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args
/// 3. Load config (the moment of truth)
/// 4. Run the thing (send it and pray 🙏)
/// 5. Handle errors (cry)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 🔒 Does the config file exist? If not, env vars get the whole stage.
    let config_file_which_may_or_may_not_exist = match cli.config.try_exists().context(format!(
        "💀 Couldn't even check whether the configuration file exists. Permissions? Cosmic rays? \
         Was checking here: '{}'",
        cli.config.display()
    ))? {
        true => Some(cli.config.as_path()),
        false => None,
    };

    let mut app_config = spx::app_config::load_config(config_file_which_may_or_may_not_exist)
        .context("💀 In spx-cli, main, we couldn't load the config. Take a look at the file and the SPX_* env vars. Something obvious is missing, probably the [sink] table")?;

    // 🎛️ flags beat files
    if let Some(target) = cli.target_total_writes {
        app_config.runtime.target_total_writes = target;
    }
    if let Some(seed) = cli.seed {
        app_config.generator.seed = Some(seed);
    }
    if let Some(input_file) = cli.input_file {
        app_config.runtime.input_file = input_file;
    }
    if cli.no_progress {
        app_config.runtime.progress = false;
    }

    // 🚀 SEND IT. No take-backs.
    match spx::run(app_config).await {
        Ok(summary) => {
            println!("{}", summary_table(&summary));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like a service isn't reachable. \
                    Double-check that Elasticsearch (or the row count endpoint, or the proxy) \
                    is actually running. If you're using Docker, try `docker ps`, \
                    or `docker compose up -d` to resurrect it. ☕"
                );
            }

            // 🗑️ Exit with prejudice.
            std::process::exit(1);
        }
    }
}

/// 🧾 The receipt.
fn summary_table(summary: &spx::RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["🧪 spx", "total"]);
    let rows: [(&str, String); 8] = [
        ("passes", summary.passes.to_string()),
        ("descriptors read", summary.descriptors_read.to_string()),
        ("samples generated", summary.samples_generated.to_string()),
        ("documents flushed", summary.totals.documents_flushed.to_string()),
        ("flushes", summary.totals.flushes.to_string()),
        ("failed flushes", summary.totals.failed_flushes.to_string()),
        (
            "single writes (failed)",
            format!(
                "{} ({})",
                summary.totals.single_writes, summary.totals.failed_single_writes
            ),
        ),
        ("elapsed", format!("{:.1?}", summary.elapsed)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_flags_parse_like_they_should() {
        let cli = Cli::parse_from(["spx", "custom.toml", "--seed", "7", "--no-progress"]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.seed, Some(7));
        assert!(cli.no_progress);
    }

    #[test]
    fn the_one_where_no_args_means_spx_toml() {
        let cli = Cli::parse_from(["spx"]);
        assert_eq!(cli.config, PathBuf::from("spx.toml"));
        assert_eq!(cli.input_file, None);
    }
}
