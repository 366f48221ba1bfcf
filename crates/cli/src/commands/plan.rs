//! `clawloop plan` — Plan-execute pipeline.

use clawloop_agent::PlanExecutePipeline;
use clawloop_core::agent::Agent;
use clawloop_core::task::ExecContext;
use std::path::Path;
use std::sync::Arc;

use super::{CliResult, build_provider, load_config};

pub async fn run(config_path: Option<&Path>, script: &Path, no_synthesis: bool, goal: &str) -> CliResult {
    let config = load_config(config_path)?;
    let provider = build_provider(&config, script)?;
    let tools = Arc::new(clawloop_tools::default_registry());

    let mut pipeline = PlanExecutePipeline::new(provider, tools).with_settings(&config.pipeline);
    if no_synthesis {
        pipeline = pipeline.with_synthesis(false);
    }

    let mut ctx = ExecContext::new();
    if let Some(timeout) = config.agent.timeout() {
        ctx = ctx.with_timeout(timeout);
    }
    let result = pipeline.invoke(&ctx, goal).await?;

    if let Some(steps) = result.metadata.get("step_outputs").and_then(|v| v.as_array()) {
        for (i, output) in steps.iter().enumerate() {
            eprintln!("  step {}: {}", i + 1, output.as_str().unwrap_or_default());
        }
    }
    println!("{}", result.output);
    Ok(())
}
