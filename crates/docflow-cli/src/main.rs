//! Docflow CLI - Command line interface for the Docflow document backend.

mod render;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use docflow_client::types::{ExportRequest, RefineRequest, WorkflowRequest};
use docflow_client::{
    ClientConfig, HttpClient, PollingSource, ScriptedSource, StatusSource, StreamSource,
    UpdateSink,
};
use docflow_core::{demo_timeline, JobId, StatusUpdate, WorkflowId, WorkflowStatus, WorkflowTracker};

type CliResult = Result<(), Box<dyn Error>>;

/// Docflow CLI - document generation from the terminal
#[derive(Parser)]
#[command(name = "docflow")]
#[command(about = "CLI for the Docflow document backend", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(short, long, global = true, default_value = "http://localhost:3001")]
    api: String,

    /// Polling interval in milliseconds
    #[arg(long, global = true, default_value = "2000")]
    interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a task-tree workflow and follow it to completion
    Workflow {
        /// Document topic
        #[arg(short, long)]
        topic: String,

        #[arg(long)]
        audience: Option<String>,

        #[arg(long)]
        purpose: Option<String>,

        #[arg(long)]
        tone: Option<String>,

        /// Poll snapshots instead of consuming the event stream
        #[arg(long)]
        poll: bool,
    },

    /// Follow an existing workflow
    Watch {
        /// Workflow ID
        id: String,

        /// Poll snapshots instead of consuming the event stream
        #[arg(long)]
        poll: bool,
    },

    /// Generate a document and follow the job
    Generate {
        #[arg(short, long)]
        prompt: String,
    },

    /// Refine a document or a selection of it
    Refine {
        #[arg(short, long)]
        prompt: String,

        /// Existing job to refine
        #[arg(long)]
        job_id: Option<String>,

        /// HTML of the selected fragment
        #[arg(long)]
        selection: Option<String>,

        /// File holding the full document HTML
        #[arg(long)]
        doc: Option<PathBuf>,
    },

    /// Export a document to PDF
    Export {
        /// File holding the full document HTML
        #[arg(long)]
        doc: PathBuf,

        #[arg(long)]
        job_id: Option<String>,

        /// Download the PDF to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Get job status
    Status {
        /// Job ID
        id: String,

        /// Keep following until the job finishes
        #[arg(short, long)]
        follow: bool,

        /// Print the raw status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cancel a job
    Cancel {
        /// Job ID to cancel
        id: String,
    },

    /// Check backend health
    Health,

    /// Replay a scripted workflow without a backend
    Demo {
        /// Delay between steps in milliseconds
        #[arg(long, default_value = "800")]
        step_ms: u64,
    },
}

#[tokio::main]
async fn main() -> CliResult {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::default()
        .with_base_url(cli.api)
        .with_poll_interval(Duration::from_millis(cli.interval_ms));
    let client = HttpClient::new(&config);

    match cli.command {
        Commands::Workflow {
            topic,
            audience,
            purpose,
            tone,
            poll,
        } => {
            let mut request = WorkflowRequest::new(topic);
            request.audience = audience;
            request.purpose = purpose;
            request.tone = tone;
            run_workflow(&client, &config, request, poll).await?;
        }
        Commands::Watch { id, poll } => {
            watch_workflow(&client, &config, WorkflowId::new(id), None, poll).await?;
        }
        Commands::Generate { prompt } => {
            generate(&client, &config, &prompt).await?;
        }
        Commands::Refine {
            prompt,
            job_id,
            selection,
            doc,
        } => {
            let request = RefineRequest {
                job_id: job_id.map(JobId::new),
                prompt,
                selection_html: selection,
                full_doc_html: doc.map(std::fs::read_to_string).transpose()?,
            };
            refine(&client, &config, &request).await?;
        }
        Commands::Export {
            doc,
            job_id,
            output,
        } => {
            let request = ExportRequest {
                job_id: job_id.map(JobId::new),
                full_doc_html: std::fs::read_to_string(doc)?,
            };
            let export = client.export(&request).await?;
            println!("PDF: {}{}", client.base_url(), export.pdf_url);
            if let Some(output) = output {
                let bytes = client.download_pdf(&export.pdf_url).await?;
                std::fs::write(&output, &bytes)?;
                println!("Saved {} bytes to {}", bytes.len(), output.display());
            }
        }
        Commands::Status { id, follow, json } => {
            status(&client, &config, JobId::new(id), follow, json).await?;
        }
        Commands::Cancel { id } => {
            let ack = client.cancel(&JobId::new(id)).await?;
            println!("{}", ack.message);
        }
        Commands::Health => {
            health(&client).await?;
        }
        Commands::Demo { step_ms } => {
            let source = ScriptedSource::new(demo_timeline(Duration::from_millis(step_ms)));
            let tracker = follow(source, WorkflowTracker::new()).await;
            finish(&tracker);
        }
    }

    Ok(())
}

async fn run_workflow(
    client: &HttpClient,
    config: &ClientConfig,
    request: WorkflowRequest,
    poll: bool,
) -> CliResult {
    let accepted = client.generate_workflow(&request).await?;
    println!(
        "Workflow {} started (job {}, ~{} tasks)",
        accepted.workflow_id, accepted.job_id, accepted.estimated_tasks
    );
    watch_workflow(client, config, accepted.workflow_id, Some(accepted.job_id), poll).await
}

async fn watch_workflow(
    client: &HttpClient,
    config: &ClientConfig,
    workflow_id: WorkflowId,
    job_id: Option<JobId>,
    poll: bool,
) -> CliResult {
    // Stream events patch a known tree, so seed the tracker with a snapshot.
    let mut tracker = WorkflowTracker::new();
    let initial = match client.workflow_tasks(&workflow_id).await {
        Ok(workflow) => workflow,
        Err(e) => {
            warn!(workflow_id = %workflow_id, error = %e, "Initial snapshot unavailable");
            WorkflowStatus::new(workflow_id.clone(), job_id)
        }
    };
    render::print_workflow(&initial);
    tracker.apply(initial.into());
    if tracker.is_terminal() {
        finish(&tracker);
        return Ok(());
    }

    let tracker = if poll {
        follow(PollingSource::workflow(client.clone(), workflow_id, config), tracker).await
    } else {
        follow(StreamSource::workflow(client.clone(), workflow_id, config), tracker).await
    };
    finish(&tracker);
    Ok(())
}

async fn generate(client: &HttpClient, config: &ClientConfig, prompt: &str) -> CliResult {
    let doc = client.generate(prompt).await?;
    println!("Job {} started", doc.job_id);
    if let Some(message) = &doc.message {
        println!("{}", message);
    }
    follow_job(client, config, doc.job_id).await;
    Ok(())
}

async fn refine(client: &HttpClient, config: &ClientConfig, request: &RefineRequest) -> CliResult {
    let doc = client.refine(request).await?;
    if let Some(message) = &doc.message {
        println!("{}", message);
    }
    if doc.status_url.is_some() {
        follow_job(client, config, doc.job_id).await;
    } else {
        println!("{}", doc.doc_html);
    }
    Ok(())
}

async fn status(
    client: &HttpClient,
    config: &ClientConfig,
    job_id: JobId,
    follow_job_status: bool,
    json: bool,
) -> CliResult {
    let job = client.job_status(&job_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        render::print_job(&job);
    }
    if follow_job_status && !job.is_terminal() {
        follow_job(client, config, job_id).await;
    } else if job.is_terminal() && !json {
        render::print_job_result(&job, client.base_url());
    }
    Ok(())
}

async fn follow_job(client: &HttpClient, config: &ClientConfig, job_id: JobId) {
    let source = StreamSource::job(client.clone(), job_id, config);
    let tracker = follow(source, WorkflowTracker::new()).await;
    if let Some(job) = tracker.job() {
        render::print_job_result(job, client.base_url());
    }
}

async fn health(client: &HttpClient) -> CliResult {
    let health = client.health().await?;
    println!("Status: {}", health.status);
    if let Some(instance) = &health.instance {
        println!("Instance: {}", instance);
    }
    let mut checks: Vec<_> = health.checks.iter().collect();
    checks.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in checks {
        println!("  {:<10} {}", name, value);
    }
    if !health.is_healthy() {
        return Err(format!("backend reports {}", health.status).into());
    }
    Ok(())
}

/// Drain a source into the tracker until the status is terminal or the user
/// interrupts, printing every change.
async fn follow(mut source: impl StatusSource, mut tracker: WorkflowTracker) -> WorkflowTracker {
    let (tx, mut rx) = mpsc::unbounded_channel();
    debug!(source = %source.describe(), "Following");
    source.start(UpdateSink::channel(tx));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let update = tokio::select! {
            _ = &mut ctrl_c => {
                println!("Interrupted");
                break;
            }
            update = rx.recv() => match update {
                Some(update) => update,
                None => break,
            },
        };
        apply_and_render(&mut tracker, update);
        if tracker.is_terminal() {
            break;
        }
    }

    source.stop();
    tracker
}

fn apply_and_render(tracker: &mut WorkflowTracker, update: StatusUpdate) {
    match update {
        StatusUpdate::Task(task_update) => {
            let id = task_update.task_id().clone();
            if !tracker.apply(task_update.into()) {
                debug!(task_id = %id, "Update for unknown task ignored");
                return;
            }
            if let Some(workflow) = tracker.workflow() {
                render::print_task_change(workflow, &id);
            }
        }
        StatusUpdate::Workflow(workflow) => {
            if tracker.workflow() == Some(&*workflow) {
                return;
            }
            tracker.apply(StatusUpdate::Workflow(workflow));
            if let Some(workflow) = tracker.workflow() {
                render::print_workflow(workflow);
            }
        }
        StatusUpdate::Job(job) => {
            tracker.apply(job.into());
            if let Some(job) = tracker.job() {
                render::print_job(job);
            }
        }
    }
}

fn finish(tracker: &WorkflowTracker) {
    if let Some(workflow) = tracker.workflow() {
        println!();
        println!(
            "Workflow {} {} ({}%, {} updates applied)",
            workflow.workflow_id,
            workflow.status,
            workflow.overall_progress,
            tracker.applied()
        );
        render::print_failures(workflow);
    }
}
