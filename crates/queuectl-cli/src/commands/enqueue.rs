//! `queuectl enqueue`: accepts a JSON spec, a `--file`, or `--command`
//! plus flags — exactly one input method.

use anyhow::{bail, Result};
use clap::Args;

use crate::bootstrap;

#[derive(Args)]
pub struct EnqueueArgs {
    /// A JSON job specification, e.g. '{"command": "echo hello"}'.
    job_spec: Option<String>,

    /// Read the job specification from a file instead.
    #[arg(long, value_name = "PATH")]
    file: Option<std::path::PathBuf>,

    /// Command to execute (alternative to a JSON spec).
    #[arg(long)]
    command: Option<String>,

    /// Job ID (auto-generated if not provided).
    #[arg(long = "id")]
    job_id: Option<String>,

    /// Maximum retry attempts.
    #[arg(long)]
    max_retries: Option<i64>,

    /// Job priority (higher values processed first).
    #[arg(long, default_value_t = 0)]
    priority: i64,

    /// Job timeout in seconds.
    #[arg(long)]
    timeout: Option<i64>,
}

pub async fn run(args: EnqueueArgs) -> Result<()> {
    let input_methods =
        args.file.is_some() as u8 + args.job_spec.is_some() as u8 + args.command.is_some() as u8;
    if input_methods == 0 {
        bail!("Must provide job specification via JSON string, --file, or --command");
    }
    if input_methods > 1 {
        bail!("Cannot specify multiple input methods (choose one: JSON string, --file, or --command)");
    }

    let (queue, config) = bootstrap().await?;

    let job_spec_str = if let Some(path) = args.file {
        std::fs::read_to_string(path)?
    } else if let Some(spec) = args.job_spec {
        spec
    } else {
        let command = args.command.expect("exactly one input method was validated");
        let mut spec = serde_json::json!({ "command": command });
        let obj = spec.as_object_mut().expect("constructed as an object");
        if let Some(id) = args.job_id {
            obj.insert("id".to_string(), serde_json::Value::String(id));
        }
        if let Some(max_retries) = args.max_retries {
            obj.insert("max_retries".to_string(), serde_json::json!(max_retries));
        }
        if args.priority != 0 {
            obj.insert("priority".to_string(), serde_json::json!(args.priority));
        }
        if let Some(timeout) = args.timeout {
            obj.insert("timeout_seconds".to_string(), serde_json::json!(timeout));
        }
        spec.to_string()
    };

    let job_id = queue
        .validate_and_enqueue(&job_spec_str, config.max_retries)
        .await?;
    println!("Job enqueued successfully with ID: {job_id}");
    Ok(())
}
