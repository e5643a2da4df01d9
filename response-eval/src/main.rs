//! Response evaluation CLI

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use response_eval::{
    batch::{BatchResultView, StatusLookup},
    config::{Config, ProviderConfig},
    model::{EvaluationInput, EvaluationRequest},
    reporting::{print_batch_report, print_check_report, print_evaluation_report, write_json},
    service::EvaluationService,
};

#[derive(Parser)]
#[command(name = "response-eval")]
#[command(about = "Score LLM agent responses with rule checks and a pluggable judge")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Judge provider override (rule_only, heuristic, openai, anthropic, gemini)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Skip the external judge and use the heuristic judge
    #[arg(long, global = true)]
    no_llm: bool,

    /// Fail instead of falling back to the heuristic judge
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every input of a request file as one request
    Evaluate {
        /// JSON request: {"id", "model_name", "inputs": [...]}
        #[arg(short, long)]
        input: PathBuf,

        /// Write the response JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a request file as a background batch and report the summary
    Batch {
        /// JSON request: {"id", "model_name", "inputs": [...]}
        #[arg(short, long)]
        input: PathBuf,

        /// Status polling interval in milliseconds
        #[arg(long, default_value = "500")]
        poll_ms: u64,

        /// Write the batch summary JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score a single prompt/response pair
    Check {
        #[arg(long)]
        prompt: String,

        #[arg(long)]
        response: String,

        #[arg(long)]
        reference: Option<String>,
    },

    /// Initialize default configuration
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "config/eval.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("response_eval=debug,info")
    } else {
        EnvFilter::new("response_eval=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    if let Commands::InitConfig { output } = &cli.command {
        return init_config(output);
    }

    let config = load_config(&cli)?;
    let service = EvaluationService::from_config(&config);
    tracing::info!("Judge backend: {}", service.judge_backend());

    match cli.command {
        Commands::Evaluate { input, output } => {
            evaluate(&service, &input, output).await?;
        }

        Commands::Batch {
            input,
            poll_ms,
            output,
        } => {
            run_batch(&service, &input, poll_ms, output).await?;
        }

        Commands::Check {
            prompt,
            response,
            reference,
        } => {
            let mut input = EvaluationInput::new(prompt, response);
            if let Some(reference) = reference {
                input = input.with_reference(reference);
            }
            let scored = service.check(&input).await?;
            print_check_report(&scored);
        }

        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Load the configuration and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(name) = &cli.provider {
        let selected = ProviderConfig::from_name(name)?;
        // Keep configured credentials when the same backend is re-selected
        if selected.kind() != config.judge.provider.kind() {
            config.judge.provider = selected;
        }
    }
    if cli.no_llm {
        config.judge.use_llm_evaluation = false;
    }
    if cli.no_fallback {
        config.judge.use_heuristic_fallback = false;
    }

    Ok(config)
}

fn load_request(path: &Path) -> Result<EvaluationRequest, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let request: EvaluationRequest = serde_json::from_str(&content)?;
    tracing::info!(
        "Loaded request {} with {} inputs from {}",
        request.id,
        request.inputs.len(),
        path.display()
    );
    Ok(request)
}

async fn evaluate(
    service: &EvaluationService,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = load_request(input)?;
    let response = service.evaluate(&request).await?;

    print_evaluation_report(&response);
    if let Some(path) = output {
        write_json(&response, &path)?;
        println!("\nResponse written to: {}", path.display());
    }
    Ok(())
}

async fn run_batch(
    service: &EvaluationService,
    input: &Path,
    poll_ms: u64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = load_request(input)?;
    let submission = service.submit_batch(request)?;
    println!("{}", submission.message);

    let batch_id = submission.batch_id;
    let mut last_processed = None;
    loop {
        tokio::time::sleep(Duration::from_millis(poll_ms.max(1))).await;
        match service.batch_status(&batch_id) {
            StatusLookup::Found(job) => {
                if last_processed != Some(job.processed) {
                    println!(
                        "Progress: {}/{} ({})",
                        job.processed, job.total, job.status
                    );
                    last_processed = Some(job.processed);
                }
                if job.status.is_terminal() {
                    break;
                }
            }
            StatusLookup::NotFound(missing) => {
                return Err(format!("Batch {}: {}", missing.batch_id, missing.message).into());
            }
        }
    }

    match service.batch_result(&batch_id) {
        BatchResultView::Completed(summary) => {
            print_batch_report(&summary);
            if let Some(path) = output {
                write_json(&summary, &path)?;
                println!("\nSummary written to: {}", path.display());
            }
            Ok(())
        }
        BatchResultView::Unavailable { error } => {
            if let StatusLookup::Found(job) = service.batch_status(&batch_id) {
                if let Some(reason) = job.error {
                    return Err(format!("Batch {} failed: {}", batch_id, reason).into());
                }
            }
            Err(error.into())
        }
    }
}

fn init_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save_toml(output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
