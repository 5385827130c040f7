use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::location::LocationSource;
use crate::store::RunStore;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "shuttle-run",
    version,
    about = "Interval run tracker with GPS distance and local run history"
)]
pub struct Cli {
    /// Print run history as a text table and exit (no TUI)
    #[arg(long)]
    pub history: bool,

    /// Print run history as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Database file path (defaults to the platform data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Address of the gpsd daemon providing location fixes
    #[arg(long, default_value = "127.0.0.1:2947")]
    pub gpsd: String,

    /// Disable location sampling (timer and shuttle counter only)
    #[arg(long)]
    pub no_location: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    let db_path = resolve_db_path(&args)?;
    let store = RunStore::open(&db_path)
        .with_context(|| format!("open run database at {}", db_path.display()))?;

    if args.json {
        let runs = store.all_runs().context("load run history")?;
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if args.history {
        return print_history(&store);
    }

    #[cfg(feature = "tui")]
    {
        let source = build_source(&args);
        return crate::tui::run(store, source).await;
    }

    // Fallback when built without TUI support.
    #[cfg(not(feature = "tui"))]
    print_history(&store)
}

fn print_history(store: &RunStore) -> Result<()> {
    let runs = store.all_runs().context("load run history")?;
    for line in crate::text_summary::history_lines(&runs) {
        println!("{line}");
    }
    Ok(())
}

/// Pick the location source from CLI flags.
#[cfg_attr(not(feature = "tui"), allow(dead_code))]
pub fn build_source(args: &Cli) -> LocationSource {
    if args.no_location {
        LocationSource::Disabled
    } else {
        LocationSource::Gpsd(args.gpsd.clone())
    }
}

fn resolve_db_path(args: &Cli) -> Result<PathBuf> {
    if let Some(path) = &args.db {
        return Ok(path.clone());
    }
    let base = dirs::data_dir().context("no platform data directory; pass --db explicitly")?;
    Ok(base.join("shuttle-run").join("runs.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_db_path_wins() {
        let args = Cli::parse_from(["shuttle-run", "--db", "/tmp/x.db"]);
        assert_eq!(resolve_db_path(&args).unwrap(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn no_location_flag_disables_sampling() {
        let args = Cli::parse_from(["shuttle-run", "--no-location"]);
        assert!(matches!(build_source(&args), LocationSource::Disabled));
    }

    #[test]
    fn gpsd_address_is_forwarded() {
        let args = Cli::parse_from(["shuttle-run", "--gpsd", "10.0.0.5:2947"]);
        match build_source(&args) {
            LocationSource::Gpsd(addr) => assert_eq!(addr, "10.0.0.5:2947"),
            other => panic!("unexpected source: {other:?}"),
        }
    }
}
