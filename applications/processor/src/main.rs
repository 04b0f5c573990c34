/// ACX Processor - master audiobook chapters to the ACX submission profile
use acx_core::{
    conformance, AudioEngine, Estimator, FfmpegEngine, MasteringPipeline, MasteringProfile,
    ProcessingEstimate,
};
use acx_processor::{config::ProcessorConfig, jobs::BatchRunner, JobStatus};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "acx-processor")]
#[command(about = "Master MP3/WAV chapters for ACX audiobook submission", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./acx.toml if present)
    #[arg(short, long, global = true, env = "ACX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Master one or more files
    Process {
        /// MP3 or WAV files to process
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for the processed files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the advisory processing-time estimate
    Estimate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print what the engine reports about a file, as JSON
    Inspect {
        input: PathBuf,
    },
    /// Check a processed MP3 against the ACX output format
    Verify {
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acx_processor=info,acx_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ProcessorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process { inputs, output_dir } => {
            process(config, &inputs, output_dir).await?;
        }
        Commands::Estimate { inputs, json } => {
            estimate(&config, &inputs, json).await?;
        }
        Commands::Inspect { input } => {
            inspect(&config, &input).await?;
        }
        Commands::Verify { input } => {
            verify(&config, &input).await?;
        }
    }

    Ok(())
}

async fn process(
    config: ProcessorConfig,
    inputs: &[PathBuf],
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    config.validate()?;

    let output_dir = output_dir.unwrap_or_else(|| config.jobs.output_dir.clone());
    tracing::info!(
        "Processing {} file(s) into {} with {} worker(s)",
        inputs.len(),
        output_dir.display(),
        config.jobs.workers
    );

    let pipeline = MasteringPipeline::with_ffmpeg(config.pipeline.clone(), &config.engine)
        .with_estimator(config.estimator);
    for input in inputs {
        if let Ok(metadata) = tokio::fs::metadata(input).await {
            tracing::info!(
                "{}: estimated {}",
                input.display(),
                pipeline.estimate(metadata.len())
            );
        }
    }

    let runner = BatchRunner::new(Arc::new(pipeline), output_dir, config.jobs.workers);
    let reports = runner.run(inputs).await?;

    let mut failed = 0;
    for report in &reports {
        match &report.status {
            JobStatus::Delivered {
                output, byte_size, ..
            } => {
                println!(
                    "ok    {} -> {} ({} bytes)",
                    report.input.display(),
                    output.display(),
                    byte_size
                );
            }
            JobStatus::Failed { message, .. } => {
                failed += 1;
                println!("FAIL  {}: {}", report.input.display(), message);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", failed, reports.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct EstimateLine<'a> {
    file: &'a Path,
    #[serde(flatten)]
    estimate: ProcessingEstimate,
}

async fn estimate(config: &ProcessorConfig, inputs: &[PathBuf], json: bool) -> anyhow::Result<()> {
    config.validate_settings()?;
    let estimator = Estimator::new(config.estimator);

    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let size = tokio::fs::metadata(input).await?.len();
        lines.push(EstimateLine {
            file: input,
            estimate: estimator.estimate(size),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else {
        for line in &lines {
            println!("{}: {}", line.file.display(), line.estimate);
        }
    }
    Ok(())
}

async fn inspect(config: &ProcessorConfig, input: &Path) -> anyhow::Result<()> {
    config.validate()?;
    let size = tokio::fs::metadata(input).await?.len();

    let engine = FfmpegEngine::from_config(&config.engine);
    let probe = engine
        .inspect(input, config.pipeline.probe_timeout(size))
        .await?;

    println!("{}", serde_json::to_string_pretty(&probe)?);
    Ok(())
}

async fn verify(config: &ProcessorConfig, input: &Path) -> anyhow::Result<()> {
    config.validate()?;
    let size = tokio::fs::metadata(input).await?.len();

    let engine = FfmpegEngine::from_config(&config.engine);
    let probe = engine
        .inspect(input, config.pipeline.probe_timeout(size))
        .await?;

    let report = conformance::check(&probe, &MasteringProfile::ACX);
    if report.is_conformant() {
        println!("{}: conforms to ACX output format", input.display());
        return Ok(());
    }

    for deviation in &report.deviations {
        println!("{}: {}", input.display(), deviation);
    }
    anyhow::bail!(
        "{} deviation(s) from the ACX output format",
        report.deviations.len()
    )
}
