use std::time::Duration;

use log::info;

use timetable::config::SearchConfig;
use timetable::display::print_solutions;
use timetable::schedule::{SearchInput, Searcher};
use timetable::web;

const DEFAULT_PORT: u16 = 8899;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_RUN_SECONDS: u64 = 10;
const PRINTED_SOLUTIONS: usize = 3;

fn print_usage() {
    println!("Usage:");
    println!("  timetable web [port] [data_dir]        serve the search API (default {} {})", DEFAULT_PORT, DEFAULT_DATA_DIR);
    println!("  timetable run <condition.json> [secs]  search for a while and print the best schedules");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config = SearchConfig::from_env();

    match args.get(1).map(String::as_str) {
        Some("web") => {
            let port = args.get(2)
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT);
            let data_dir = args.get(3).cloned().unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

            println!("Starting web server on port {}...", port);
            println!("Access the API at http://localhost:{}/api/status", port);
            web::start_server(port, data_dir, config).await?;
        }
        Some("run") => {
            let Some(path) = args.get(2) else {
                print_usage();
                return Ok(());
            };
            let seconds = args.get(3)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RUN_SECONDS);

            let raw = std::fs::read_to_string(path)?;
            let input: SearchInput = serde_json::from_str(&raw)?;

            let searcher = Searcher::new(config);
            let started = searcher.start(&input).await?;
            info!("{} solutions after the initial wait", started.solutions.len());

            tokio::time::sleep(Duration::from_secs(seconds)).await;
            searcher.stop().await;

            let report = searcher.solutions();
            if let Some(condition) = searcher.condition() {
                print_solutions(&condition, &report.solutions, report.attempts, PRINTED_SOLUTIONS);
            }
        }
        _ => print_usage(),
    }

    Ok(())
}
