use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "facefind", about = "Facefind event-photo matching CLI")]
struct Cli {
    /// Base URL of the facefindd daemon
    #[arg(long, default_value = "http://127.0.0.1:8420")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a participant's selfie against an event's photos
    Match {
        /// Participant ID
        #[arg(short, long)]
        participant: String,
        /// URL of the participant's selfie
        #[arg(short, long)]
        selfie_url: String,
        /// Event ID
        #[arg(short, long)]
        event: String,
    },
    /// Register a photo for an event
    AddPhoto {
        #[arg(short, long)]
        event: String,
        /// Publicly resolvable photo URL
        #[arg(short, long)]
        url: String,
    },
    /// Run a face detection pass for a registered photo
    Detect {
        /// Photo ID
        id: String,
        /// Override the stored image URL
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Re-detect faces across an event's entire photo set
    Refresh {
        /// Event ID
        id: String,
    },
    /// List persisted matches for a participant
    Matches {
        /// Participant ID
        id: String,
    },
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let server = cli.server.trim_end_matches('/').to_string();

    let response = match cli.command {
        Commands::Match { participant, selfie_url, event } => {
            client
                .post(format!("{server}/match"))
                .json(&json!({
                    "participant_id": participant,
                    "selfie_url": selfie_url,
                    "event_id": event,
                }))
                .send()
                .await
        }
        Commands::AddPhoto { event, url } => {
            client
                .post(format!("{server}/photos"))
                .json(&json!({ "event_id": event, "original_url": url }))
                .send()
                .await
        }
        Commands::Detect { id, image_url } => {
            client
                .post(format!("{server}/photos/{id}/detect"))
                .json(&json!({ "image_url": image_url }))
                .send()
                .await
        }
        Commands::Refresh { id } => {
            client.post(format!("{server}/events/{id}/refresh")).send().await
        }
        Commands::Matches { id } => {
            client.get(format!("{server}/participants/{id}/matches")).send().await
        }
        Commands::Status => client.get(format!("{server}/health")).send().await,
    };

    let response = response.with_context(|| format!("could not reach facefindd at {server}"))?;
    let status = response.status();
    let body: Value = response.json().await.context("daemon returned a non-JSON body")?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("daemon returned {status}");
    }
    Ok(())
}
