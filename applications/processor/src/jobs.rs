/// Batch mastering runner
use crate::error::Result;
use acx_core::{ErrorKind, MasteringPipeline, PipelineError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

const OUTPUT_PREFIX: &str = "ACX_processed_";

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Delivered {
        output: PathBuf,
        byte_size: u64,
        second_pass: bool,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

/// Outcome of one input in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub input: PathBuf,
    pub status: JobStatus,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Delivered { .. })
    }
}

/// Runs inputs through one shared pipeline with bounded concurrency
pub struct BatchRunner {
    pipeline: Arc<MasteringPipeline>,
    output_dir: PathBuf,
    workers: usize,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<MasteringPipeline>, output_dir: PathBuf, workers: usize) -> Self {
        Self {
            pipeline,
            output_dir,
            workers: workers.max(1),
        }
    }

    /// Process every input; reports come back in input order
    pub async fn run(&self, inputs: &[PathBuf]) -> Result<Vec<JobReport>> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let names = output_names(inputs);
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(inputs.len());

        for (input, name) in inputs.iter().cloned().zip(names) {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            let dest = self.output_dir.join(name);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let status = match process_one(&pipeline, &input, &dest).await {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::error!("Failed to process {}: {}", input.display(), e);
                        JobStatus::Failed {
                            kind: e.kind(),
                            message: e.to_string(),
                        }
                    }
                };
                JobReport { input, status }
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (handle, input) in handles.into_iter().zip(inputs) {
            let report = handle.await.unwrap_or_else(|e| JobReport {
                input: input.clone(),
                status: JobStatus::Failed {
                    kind: ErrorKind::Internal,
                    message: format!("job task failed: {}", e),
                },
            });
            reports.push(report);
        }

        let failed = reports.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            "Batch complete: {} succeeded, {} failed",
            reports.len() - failed,
            failed
        );
        Ok(reports)
    }
}

async fn process_one(
    pipeline: &MasteringPipeline,
    input: &Path,
    dest: &Path,
) -> std::result::Result<JobStatus, PipelineError> {
    let job = pipeline.ingest_file(input).await?;
    let processed = pipeline.run(job).await?;

    let byte_size = processed.byte_size();
    let second_pass = processed.ran_second_pass();
    let output = processed.deliver_to(dest).await?;
    tracing::info!("Delivered {} -> {}", input.display(), output.display());

    Ok(JobStatus::Delivered {
        output,
        byte_size,
        second_pass,
    })
}

/// Download name for a processed input: `ACX_processed_<stem>.mp3`
pub fn output_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "audio".to_string());
    format!("{}{}.mp3", OUTPUT_PREFIX, stem)
}

/// Output names for a batch, suffixed where two inputs share a stem
fn output_names(inputs: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let base = output_name(input);
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                let stem = base.trim_end_matches(".mp3");
                name = format!("{}_{}.mp3", stem, n);
                n += 1;
            }
            name
        })
        .collect()
}
