//! Manual smoke test: send one request through the engine and print the
//! result.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use netqueue_core::{EngineConfig, NetworkManager, Request};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "netqueue-smoke", about = "Send one request through the dispatch engine")]
struct Args {
    /// Target URL.
    #[arg(default_value = "https://httpbin.org/user-agent")]
    url: String,

    /// Header line, `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Send a POST with this body instead of a GET.
    #[arg(short, long)]
    data: Option<String>,

    #[arg(short, long, default_value = "Testing")]
    tag: String,

    /// JSON engine config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 60)]
    wait_secs: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    info!("launching dispatch engine");
    let manager = NetworkManager::new(config)?;

    let mut request = match args.data {
        Some(body) => Request::post(args.url, body),
        None => Request::get(args.url),
    };
    if args.headers.is_empty() {
        request.add_header(concat!("User-Agent: netqueue-smoke/", env!("CARGO_PKG_VERSION")));
    }
    for header in args.headers {
        request.add_header(header);
    }
    request.tag = args.tag;

    manager.send(request)?;
    info!("request sent to the worker");

    let deadline = Instant::now() + Duration::from_secs(args.wait_secs);
    let response = loop {
        if let Some(response) = manager.get_response() {
            break response;
        }
        if Instant::now() >= deadline {
            error!("no response after {}s", args.wait_secs);
            manager.shutdown(true)?;
            return Ok(false);
        }
        debug!("waiting...");
        thread::sleep(Duration::from_millis(100));
    };

    println!("STATUS: {}", response.status());
    println!("SUCCESS: {}", response.success());
    println!("TAG: {}", response.tag());
    if let Some(err) = response.error() {
        println!("ERROR: {err}");
    }
    println!("DATA: {}", response.text());

    let ok = response.success();
    drop(response);
    manager.shutdown(false)?;
    Ok(ok)
}
