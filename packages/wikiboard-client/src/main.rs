use std::process::ExitCode;

use clap::Parser;
use wikiboard_client::cli::{self, Cli};
use wikiboard_client::log_bridge;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = log_bridge::init(cli.verbose) {
        log_bridge::write_fallback_line(&format!("failed to initialize client logger: {}", e));
    }

    let mut stdout = std::io::stdout().lock();
    match cli::run(cli, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            let problems = log_bridge::recent_problems();
            if !problems.is_empty() {
                eprintln!("recent problems:");
                for entry in &problems {
                    eprintln!("  [{}] {}: {}", entry.level, entry.target, entry.message);
                }
            }
            eprintln!("log: {}", log_bridge::log_file_path().display());
            ExitCode::FAILURE
        }
    }
}
