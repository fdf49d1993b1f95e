use clap::Parser;
use crate::scout;
use rental_scout::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "rental-scout",
    about = "Search MercadoLibre Uruguay for rental apartments and print new listings as JSON Lines",
    version
)]
pub(crate) struct Cli {
    /// Enable debug-level logging
    #[arg(short, long)]
    pub(crate) verbose: bool,
    /// Search configuration file (defaults to APP_SEARCH_CONFIG or config.json)
    #[arg(short, long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
    /// Erase the visited-listings history before searching
    #[arg(long)]
    pub(crate) clear_history: bool,
    /// Emit listings even when they were already seen in a previous run
    #[arg(long)]
    pub(crate) no_dedup: bool,
    /// Only search this configured neighborhood
    #[arg(short, long, value_name = "NAME")]
    pub(crate) neighborhood: Option<String>,
    /// Skip detail-page fetches for maintenance fees
    #[arg(long)]
    pub(crate) no_fees: bool,
    /// Write run counters in Prometheus text format to this file
    #[arg(long, value_name = "PATH")]
    pub(crate) metrics_file: Option<PathBuf>,
}

pub(crate) fn run() -> Result<(), AppError> {
    scout::run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_everything() {
        let cli = Cli::try_parse_from(["rental-scout"]).expect("parse defaults");
        assert!(!cli.verbose);
        assert!(!cli.clear_history);
        assert!(!cli.no_dedup);
        assert!(!cli.no_fees);
        assert!(cli.config.is_none());
        assert!(cli.neighborhood.is_none());
        assert!(cli.metrics_file.is_none());
    }

    #[test]
    fn short_flags_are_accepted() {
        let cli = Cli::try_parse_from(["rental-scout", "-v", "-c", "busqueda.json", "-n", "Pocitos"])
            .expect("parse short flags");
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("busqueda.json")));
        assert_eq!(cli.neighborhood.as_deref(), Some("Pocitos"));
    }

    #[test]
    fn long_switches_are_accepted() {
        let cli = Cli::try_parse_from([
            "rental-scout",
            "--clear-history",
            "--no-dedup",
            "--no-fees",
            "--metrics-file",
            "/var/lib/node_exporter/rental_scout.prom",
        ])
        .expect("parse long flags");
        assert!(cli.clear_history);
        assert!(cli.no_dedup);
        assert!(cli.no_fees);
        assert_eq!(
            cli.metrics_file,
            Some(PathBuf::from("/var/lib/node_exporter/rental_scout.prom"))
        );
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["rental-scout", "--pages", "4"]).is_err());
    }
}
