use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use solveshot_lib::ai::openai::OpenAIGateway;
use solveshot_lib::{AppConfig, ChannelNotifier, Orchestrator, ProcessingEvent, ScreenshotQueue};

#[derive(Parser, Debug)]
#[command(
    name = "solveshot",
    about = "Turn screenshots or a spoken question into a structured problem and its solution",
    version
)]
struct Args {
    /// Directory holding config.json (defaults to the per-user config directory)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and solve the problem shown in the screenshots
    Solve {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Solve from the first set of screenshots, then refine with the extra set
    Debug {
        #[arg(long, required = true, num_args = 1..)]
        screens: Vec<PathBuf>,

        #[arg(long, required = true, num_args = 1..)]
        extra: Vec<PathBuf>,
    },
    /// Solve a question asked in an audio recording
    Audio { file: PathBuf },
}

#[derive(Serialize)]
struct EventLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a ProcessingEvent,
}

fn print_event(event: &ProcessingEvent) {
    let line = EventLine {
        timestamp: chrono::Utc::now().to_rfc3339(),
        event,
    };
    match serde_json::to_string(&line) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Could not serialise {} event: {}", event.name(), e),
    }
}

async fn run(orchestrator: &Orchestrator, queue: &ScreenshotQueue, command: Command) -> Result<()> {
    match command {
        Command::Solve { images } => {
            for image in images {
                queue.enqueue(image);
            }
            orchestrator.run_primary_pipeline().await?;
        }
        Command::Debug { screens, extra } => {
            for screen in screens {
                queue.enqueue(screen);
            }
            orchestrator.run_primary_pipeline().await?;

            for screen in extra {
                queue.enqueue_extra(screen);
            }
            orchestrator.run_debug_pipeline().await?;
        }
        Command::Audio { file } => {
            orchestrator.process_audio(&file).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => AppConfig::default_data_dir().context("Could not determine a config directory")?,
    };
    let config = AppConfig::load(&config_dir);
    log::info!(
        "Using {} (chat: {}, vision: {})",
        config.openai_base_url,
        config.chat_model,
        config.vision_model
    );

    let gateway = Arc::new(OpenAIGateway::new(config)?);
    let queue = Arc::new(ScreenshotQueue::new());
    let (notifier, mut events) = ChannelNotifier::new();
    let orchestrator = Arc::new(Orchestrator::new(gateway, queue.clone(), Arc::new(notifier)));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let interrupt = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling");
                orchestrator.cancel_all();
            }
        })
    };

    let outcome = run(&orchestrator, &queue, args.command).await;

    interrupt.abort();
    let _ = interrupt.await;
    // Last handle to the notifier; the printer drains and exits
    drop(orchestrator);
    printer.await?;

    outcome
}
