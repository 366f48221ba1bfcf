//! `clawloop run` — Single-agent tool loop.

use clawloop_agent::ReactAgent;
use clawloop_core::agent::Agent;
use clawloop_core::event::{DomainEvent, EventBus};
use clawloop_core::task::ExecContext;
use std::path::Path;
use std::sync::Arc;

use super::{CliResult, build_provider, load_config};

pub async fn run(
    config_path: Option<&Path>,
    script: &Path,
    max_iterations: Option<u32>,
    prompt: &str,
) -> CliResult {
    let mut config = load_config(config_path)?;
    if let Some(max) = max_iterations {
        config.agent.max_iterations = max;
        config.validate()?;
    }

    let provider = build_provider(&config, script)?;
    let tools = Arc::new(clawloop_tools::default_registry());
    let bus = EventBus::default();
    let mut events = bus.subscribe();

    let agent = ReactAgent::new(provider, tools)
        .with_settings(&config.agent)
        .with_event_bus(bus);

    let ctx = ExecContext::new();
    let outcome = agent.invoke(&ctx, prompt).await;

    while let Ok(event) = events.try_recv() {
        if let DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } = event.as_ref()
        {
            let mark = if *success { "✓" } else { "✗" };
            eprintln!("  {mark} {tool_name} ({duration_ms} ms)");
        }
    }

    let result = outcome?;
    println!("{}", result.output);
    Ok(())
}
