//! VGen command-line client.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_client::{Completion, VideoGenClient, VideoGenConfig};
use vgen_models::dimensions::supported_aspect_ratios;
use vgen_models::{common_dimensions, GenerationRequest, JobId, Quality};

use crate::cli::{Cli, Command, GenerateArgs};

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// JSON logs when `LOG_FORMAT=json`, human-readable otherwise. Logs go to
/// stderr so results on stdout stay pipeable.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vgen_client=info,vgen_cli=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Offline commands
    match &cli.command {
        Command::Schema => {
            let schema = schemars::schema_for!(GenerationRequest);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Dimensions => {
            print_dimensions(cli.json)?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = VideoGenConfig::from_env().context("Failed to load configuration")?;
    info!(
        endpoint = %config.base_url(),
        deployment = %config.deployment,
        "Using video deployment"
    );
    let client = VideoGenClient::new(config).context("Failed to create HTTP client")?;

    match cli.command {
        Command::Generate(args) => generate(&client, &args, cli.json).await,
        Command::Status { job_id } => {
            let snapshot = client.poll(&JobId::from(job_id)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let mut line = format!("{} {}", snapshot.id, snapshot.status);
                if let Some(progress) = snapshot.progress {
                    line.push_str(&format!(" {}%", progress));
                }
                if let Some(url) = &snapshot.result_url {
                    line.push_str(&format!(" {}", url));
                }
                if let Some(message) = &snapshot.error_message {
                    line.push_str(&format!(" ({})", message));
                }
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Wait { job_id, wait } => {
            let options = wait.options(client.config());
            let job_id = JobId::from(job_id);
            match client
                .wait_for_completion(&job_id, options, Some(cancel_on_ctrl_c()))
                .await?
            {
                Completion::Finished(url) => {
                    print_value(cli.json, "result_url", &url);
                    Ok(ExitCode::SUCCESS)
                }
                Completion::Cancelled => {
                    warn!(job_id = %job_id, "Stopped waiting; the job keeps running on the server");
                    Ok(ExitCode::from(EXIT_INTERRUPTED))
                }
            }
        }
        Command::Download { url, output } => {
            let bytes = client.download(&url, &output).await?;
            if cli.json {
                println!("{}", serde_json::json!({ "path": output, "bytes": bytes }));
            } else {
                println!("{} ({} bytes)", output.display(), bytes);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { job_id } => {
            client.delete_job(&JobId::from(job_id)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Enhance { prompt } => {
            let enhancement = client.enhance_prompt(&prompt).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&enhancement)?);
            } else {
                for (i, suggestion) in enhancement.suggestions.iter().enumerate() {
                    println!("{}. {}", i + 1, suggestion);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema | Command::Dimensions => Ok(ExitCode::SUCCESS),
    }
}

async fn generate(client: &VideoGenClient, args: &GenerateArgs, json: bool) -> anyhow::Result<ExitCode> {
    let request = args.to_request()?;
    let job_id = client.submit(&request).await?;

    if args.no_wait {
        print_value(json, "job_id", job_id.as_str());
        return Ok(ExitCode::SUCCESS);
    }

    let options = args.wait.options(client.config());
    let url = match client
        .wait_for_completion(&job_id, options, Some(cancel_on_ctrl_c()))
        .await
        .with_context(|| format!("Job {} did not complete", job_id))?
    {
        Completion::Finished(url) => url,
        Completion::Cancelled => {
            warn!(job_id = %job_id, "Stopped waiting; resume with 'vgen wait {}'", job_id);
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    let bytes = client
        .download(&url, &args.output)
        .await
        .with_context(|| format!("Job {} finished but the download failed", job_id))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "job_id": job_id,
                "result_url": url,
                "path": args.output,
                "bytes": bytes,
            })
        );
    } else {
        println!("{} ({} bytes)", args.output.display(), bytes);
    }
    Ok(ExitCode::SUCCESS)
}

/// Flip to `true` on the first Ctrl-C.
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt signal");
                let _ = tx.send(true);
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
    rx
}

fn print_value(json: bool, key: &str, value: &str) {
    if json {
        let mut object = serde_json::Map::new();
        object.insert(key.to_string(), value.into());
        println!("{}", serde_json::Value::Object(object));
    } else {
        println!("{}", value);
    }
}

fn print_dimensions(json: bool) -> anyhow::Result<()> {
    const QUALITIES: [Quality; 4] = [Quality::Low, Quality::Medium, Quality::High, Quality::Ultra];

    let mut rows = Vec::new();
    for ratio in supported_aspect_ratios() {
        for quality in QUALITIES {
            rows.push((ratio, quality, common_dimensions(ratio, quality)?));
        }
    }

    if json {
        let rows: Vec<_> = rows
            .iter()
            .map(|(ratio, quality, dims)| {
                serde_json::json!({
                    "aspect_ratio": ratio,
                    "quality": quality,
                    "width": dims.width,
                    "height": dims.height,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for (ratio, quality, dims) in rows {
            println!("{:<6} {:<7} {}", ratio, quality.as_str(), dims);
        }
    }
    Ok(())
}
