//! statement-sync - download CSAS statements and import them into Pohoda
//!
//! Prints one pretty-printed JSON sync report on stdout and exits with:
//!
//! - `0` success
//! - `1` statement download failed
//! - `2` Pohoda import failed

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use tracing::Level;

use statement_sync_core::downloader::DEFAULT_DOWNLOADER_SCRIPT;
use statement_sync_core::importer::DEFAULT_IMPORTER_SCRIPT;
use statement_sync_core::{
    home_path, Downloader, Importer, PohodaTarget, ProcessExecutor, SyncPipeline, SyncRequest,
    ToolCommand, DEFAULT_ENV_FILE,
};

const DEFAULT_OUTPUT_DIR: &str = "statements";

#[derive(Parser, Debug)]
#[command(name = "statement-sync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Download CSAS statements and import them to Pohoda", long_about = None)]
struct Cli {
    /// Start date in YYYY-MM-DD format
    #[arg(long, value_parser = parse_date)]
    from_date: NaiveDate,

    /// End date in YYYY-MM-DD format
    #[arg(long, value_parser = parse_date)]
    to_date: NaiveDate,

    /// Directory to save statements
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Pohoda API URL
    #[arg(long, env = "POHODA_URL")]
    pohoda_url: String,

    /// Pohoda API token
    #[arg(long, env = "POHODA_TOKEN", hide_env_values = true)]
    pohoda_token: String,

    /// Environment file layered over the inherited environment of both tools
    #[arg(long, env = "STATEMENT_SYNC_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// PHP interpreter used to run both tools
    #[arg(long, env = "STATEMENT_SYNC_PHP", default_value = "php")]
    php: PathBuf,

    /// Path to csas-statement-downloader.php
    #[arg(long, env = "STATEMENT_SYNC_DOWNLOADER")]
    downloader: Option<PathBuf>,

    /// Path to the pohoda-abo-importer script
    #[arg(long, env = "STATEMENT_SYNC_IMPORTER")]
    importer: Option<PathBuf>,

    /// Per-tool timeout in seconds (0 = wait indefinitely)
    #[arg(long, env = "STATEMENT_SYNC_TIMEOUT_SECS", default_value_t = 0)]
    timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    fn tool(&self, script: Option<&PathBuf>, default_script: &str) -> ToolCommand {
        let script = script.cloned().unwrap_or_else(|| home_path(default_script));
        ToolCommand::script(self.php.clone(), &script)
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    statement_sync_core::init_tracing(cli.json_logs, level);

    // The env file and the date range are checked inside the pipeline, so a
    // bad value still yields a JSON report with the download-failure code.
    let timeout = cli.timeout();
    let pipeline = SyncPipeline::new(
        Arc::new(ProcessExecutor),
        Downloader::new(cli.tool(cli.downloader.as_ref(), DEFAULT_DOWNLOADER_SCRIPT), timeout),
        Importer::new(cli.tool(cli.importer.as_ref(), DEFAULT_IMPORTER_SCRIPT), timeout),
        cli.env_file.clone(),
    );

    let request = SyncRequest {
        from_date: cli.from_date,
        to_date: cli.to_date,
        output_dir: cli.output_dir.clone(),
        target: PohodaTarget {
            url: cli.pohoda_url.clone(),
            token: cli.pohoda_token.clone(),
        },
    };

    let outcome = pipeline.run(&request).await;
    println!("{}", outcome.report.to_pretty_json()?);

    let code = outcome.exit.code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec![
            "statement-sync",
            "--from-date",
            "2025-09-01",
            "--to-date",
            "2025-09-15",
            "--pohoda-url",
            "http://pohoda.local",
            "--pohoda-token",
            "t",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("parse failed")
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_conventions() {
        let cli = parse(&[]);
        assert_eq!(cli.output_dir, PathBuf::from("statements"));
        assert_eq!(cli.from_date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert!(cli.timeout().is_none());

        let tool = cli.tool(None, DEFAULT_IMPORTER_SCRIPT);
        assert!(tool.prefix_args[0].ends_with("pohoda-abo-importer/src/importer.php"));
    }

    #[test]
    fn tool_paths_are_configurable() {
        let cli = parse(&["--php", "/usr/bin/php8.2", "--downloader", "/srv/dl.php", "--timeout-secs", "30"]);
        let tool = cli.tool(cli.downloader.as_ref(), DEFAULT_DOWNLOADER_SCRIPT);
        assert_eq!(tool.program, PathBuf::from("/usr/bin/php8.2"));
        assert_eq!(tool.prefix_args, vec!["/srv/dl.php".to_string()]);
        assert_eq!(cli.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn inverted_range_is_left_to_the_pipeline() {
        let cli = Cli::try_parse_from([
            "statement-sync",
            "--from-date",
            "2025-09-05",
            "--to-date",
            "2025-09-02",
            "--pohoda-url",
            "u",
            "--pohoda-token",
            "t",
        ])
        .expect("inverted range should parse");
        assert!(cli.from_date > cli.to_date);
    }

    #[test]
    fn malformed_date_is_rejected() {
        let result = Cli::try_parse_from([
            "statement-sync",
            "--from-date",
            "01.09.2025",
            "--to-date",
            "2025-09-15",
            "--pohoda-url",
            "u",
            "--pohoda-token",
            "t",
        ]);
        assert!(result.is_err());
    }
}
