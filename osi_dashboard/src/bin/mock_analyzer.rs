use osi_dashboard::MockAnalyzer;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

fn parse_arg_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() {
    osi_dashboard::init_tracing("info");
    let args: Vec<String> = std::env::args().collect();

    let addr = parse_arg_value(&args, "--addr")
        .or_else(|| std::env::var("OSI_MOCK_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let addr_file = parse_arg_value(&args, "--addr-file").map(PathBuf::from);
    let run_for = parse_arg_value(&args, "--run-for-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis);
    let complete_delay = parse_arg_value(&args, "--complete-delay-ms")
        .and_then(|s| s.parse::<u64>().ok())
        .map_or(Duration::ZERO, Duration::from_millis);

    let server = match MockAnalyzer::bind_with_delay(&addr, complete_delay).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = &addr_file {
        let _ = fs::write(path, server.local_addr().to_string());
    }

    println!("mock_analyzer listening on {}", server.ws_url());

    match run_for {
        Some(max) => tokio::time::sleep(max).await,
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }

    server.shutdown();
}
