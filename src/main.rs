use clap::Parser;
use deep_search::tool::{DeepSearchArgs, TOOL_NAME, ToolOutput};
use deep_search::{Config, ConfigError, Service};
use serde_json::{Value, json};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.debug);
    ::log::info!("Starting {} (WebDriver at {})", TOOL_NAME, config.webdriver_url);
    ::log::debug!(
        "Headless: {}, page timeout: {} ms",
        config.headless,
        config.page_timeout_ms
    );

    let service = Arc::new(Service::from_config(&config));

    let code = tokio::select! {
        code = run(&args, Arc::clone(&service)) => code,
        () = shutdown_signal() => {
            ::log::info!("Shutdown signal received, abandoning running work");
            ExitCode::from(130)
        }
    };

    service.shutdown().await;
    code
}

fn load_config(args: &Args) -> Result<Config, ConfigError> {
    match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
}

/// Log to stderr; `RUST_LOG` overrides the level picked by debug mode
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

async fn run(args: &Args, service: Arc<Service>) -> ExitCode {
    if args.describe {
        match serde_json::to_string_pretty(&service.tool.descriptor()) {
            Ok(descriptor) => {
                println!("{}", descriptor);
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if args.serve {
        serve(service).await;
        return ExitCode::SUCCESS;
    }

    let Some(query) = args.query.clone() else {
        eprintln!("A query is required unless --serve is given");
        return ExitCode::FAILURE;
    };

    let request = DeepSearchArgs {
        query,
        results: args.results,
        depth: args.depth,
    };

    match service.tool.run(&request).await {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Deep search failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Answer one JSON request per stdin line until stdin closes
///
/// Requests run concurrently against the shared session. Responses go out
/// through a single writer so lines never interleave.
async fn serve(service: Arc<Service>) {
    ::log::info!("Serving {} requests on stdin", TOOL_NAME);

    let (tx, mut rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            let written = async {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await
            };
            if let Err(e) = written.await {
                ::log::error!("Failed to write response: {}", e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests = JoinSet::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let service = Arc::clone(&service);
                let tx = tx.clone();
                requests.spawn(async move {
                    let response = handle_request(&service, &line).await;
                    if tx.send(response).await.is_err() {
                        ::log::warn!("Response writer has stopped, dropping response");
                    }
                });
            }
            Ok(None) => break,
            Err(e) => {
                ::log::error!("Failed to read request: {}", e);
                break;
            }
        }
    }

    while let Some(result) = requests.join_next().await {
        if let Err(e) = result {
            ::log::error!("Request task failed: {}", e);
        }
    }

    drop(tx);
    if let Err(e) = writer.await {
        ::log::error!("Response writer failed: {}", e);
    }
}

/// Run one request line and encode its response line
async fn handle_request(service: &Service, line: &str) -> String {
    let (id, output) = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut request)) => {
            let id = request.remove("id").unwrap_or(Value::Null);
            (id, service.tool.call(Value::Object(request)).await)
        }
        Ok(_) => (
            Value::Null,
            ToolOutput::error("Malformed request: expected a JSON object"),
        ),
        Err(e) => (Value::Null, ToolOutput::error(format!("Malformed request: {}", e))),
    };

    json!({ "id": id, "text": output.text, "is_error": output.is_error }).to_string()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            ::log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                ::log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
