use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;
use twin_core::config::LoggingConfig;
use twin_core::context::to_context;
use twin_core::TwinSystemConfig;
use twin_engine::TwinEngine;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "twin.toml")]
    config: PathBuf,

    /// Name of the twin to create
    #[arg(short, long, default_value = "Twin")]
    name: String,

    /// Age of the twin
    #[arg(short, long, default_value_t = 30)]
    age: u32,

    /// Occupation (student, engineer, artist, manager, ...)
    #[arg(short, long, default_value = "engineer")]
    occupation: String,

    /// Send one message, print the reply and exit
    #[arg(short, long)]
    message: Option<String>,
}

const HELP: &str = "Commands: status | health | trends | behavior | decide <situation> | quit. Anything else is sent as a message.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = TwinSystemConfig::load_or_default(&args.config);
    let _log_guard = init_logging(&config.logging);

    info!("Initializing twin engine...");
    let engine = TwinEngine::initialize(config).await;
    engine.start().await;

    let twin_config = to_context(json!({
        "name": args.name,
        "age": args.age,
        "occupation": args.occupation,
        "twin_type": "human",
    }));
    let twin_id = engine
        .create_twin(&twin_config)
        .await
        .context("Failed to create twin")?;
    info!("Twin {} ready", twin_id);

    let result = match args.message {
        Some(message) => say(&engine, &twin_id, &args.name, &message).await,
        None => repl(&engine, &twin_id, &args.name).await,
    };

    engine.shutdown().await;
    result
}

/// Log to stderr (or `logging.file`) so stdout carries only the shell.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "twin.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}

async fn repl(engine: &TwinEngine, twin_id: &str, name: &str) -> anyhow::Result<()> {
    // Blocking stdin lives on its own thread so Ctrl-C never waits on a read.
    let (tx, mut rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("{} is online. {}", name, HELP);
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = rx.recv() => line,
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }
        if let Err(e) = run_command(engine, twin_id, name, input).await {
            error!("Command failed: {:#}", e);
            println!("[Error]: {}", e);
        }
    }
    Ok(())
}

async fn run_command(
    engine: &TwinEngine,
    twin_id: &str,
    name: &str,
    input: &str,
) -> anyhow::Result<()> {
    let (command, rest) = input.split_once(' ').unwrap_or((input, ""));
    let request = match command {
        "help" => {
            println!("{}", HELP);
            return Ok(());
        }
        "status" => {
            let status = engine.get_system_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }
        "health" => json!({"type": "health_query", "query_type": "current_status"}),
        "trends" => json!({"type": "health_query", "query_type": "trends"}),
        "behavior" => json!({"type": "behavior_request", "behavior_type": "summary"}),
        "decide" if !rest.trim().is_empty() => json!({
            "type": "behavior_request",
            "behavior_type": "decide",
            "situation": rest.trim(),
        }),
        "decide" => {
            println!("Usage: decide <situation>");
            return Ok(());
        }
        _ => return say(engine, twin_id, name, input).await,
    };

    let response = interact(engine, twin_id, request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn say(engine: &TwinEngine, twin_id: &str, name: &str, message: &str) -> anyhow::Result<()> {
    let response = interact(
        engine,
        twin_id,
        json!({"type": "conversation", "message": message, "sender": "terminal"}),
    )
    .await?;
    let reply = response
        .get("response")
        .and_then(Value::as_str)
        .unwrap_or_default();
    println!("{}: {}", name, reply);
    Ok(())
}

async fn interact(engine: &TwinEngine, twin_id: &str, request: Value) -> anyhow::Result<Value> {
    engine
        .process_interaction(twin_id, &to_context(request))
        .await
        .map(|r| r.response)
        .with_context(|| format!("Twin {} no longer exists", twin_id))
}
