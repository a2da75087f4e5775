use std::{process::ExitCode, time::Duration};

use anyhow::Result;
use bff_api::{
    availability_page, generate_schedule, home_page, import_availability, schedule_page,
    BffContext,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use upstream_client::{UpstreamClient, UpstreamConfig, DEFAULT_API_BASE};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,
    /// Per-call upstream deadline in seconds; 0 disables it.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Home,
    ShowSchedule {
        id: String,
    },
    ShowAvailability {
        id: String,
    },
    Generate {
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    Import {
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let upstream = UpstreamClient::new(&UpstreamConfig {
        api_base: cli.api_base,
        timeout: (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs)),
    })?;
    let ctx = BffContext::new(upstream);

    let outcome = match cli.command {
        Command::Home => Ok(to_json(&home_page(&ctx).await)?),
        Command::ShowSchedule { id } => match schedule_page(&ctx, &id).await {
            Ok(page) => Ok(to_json(&page)?),
            Err(err) => Err(err),
        },
        Command::ShowAvailability { id } => match availability_page(&ctx, &id).await {
            Ok(page) => Ok(to_json(&page)?),
            Err(err) => Err(err),
        },
        Command::Generate { parent, name } => {
            generate_schedule(&ctx, parent.as_deref(), name.as_deref())
                .await
                .map(|target| format!("created: {}", target.location))
        }
        Command::Import { url } => import_availability(&ctx, &url)
            .await
            .map(|_| "imported".to_string()),
    };

    match outcome {
        Ok(output) => {
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}: {}", err.message, err.error);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn to_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
