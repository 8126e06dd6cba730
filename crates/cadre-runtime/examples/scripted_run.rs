//! Scripted run example for Cadre
//!
//! This example demonstrates:
//! - Assembling an engine from configuration
//! - Driving a dependency-routed run with a scripted reasoning double
//! - Consuming the step-event stream
//! - Resuming the same thread from its latest checkpoint

use std::sync::Arc;

use cadre_agents::llm::MockReasoning;
use cadre_config::CadreConfig;
use cadre_core::reasoning::Reasoning;
use cadre_core::ThreadId;
use cadre_runtime::{build_engine, init_tracing};

const BREAKDOWN: &str = r#"{"tasks":[
    {"task_id":"T1","title":"Research","description":"survey login page patterns","assignee":"Researcher","dependencies":[]},
    {"task_id":"T2","title":"Build","description":"implement the login page","assignee":"Developer","dependencies":["T1"]}
]}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CadreConfig::default();
    init_tracing(&config.observability);

    // A scripted double stands in for the reasoning provider, so the
    // example runs offline and deterministically.
    let reasoning: Arc<dyn Reasoning> = Arc::new(MockReasoning::scripted(vec![
        BREAKDOWN.to_string(),
        "Findings: email+password form with OAuth fallback is standard.".to_string(),
        "Implemented the login page with validation and OAuth buttons.".to_string(),
    ]));

    let engine = build_engine(&config, reasoning);
    let thread_id = ThreadId::generate();
    println!("=== Cadre Scripted Run (thread {thread_id}) ===\n");

    let mut stream = engine
        .start_run(thread_id.clone(), "build a login page")
        .await?;
    while let Some(event) = stream.next_event().await {
        println!(
            "step {} | actor {} | next {}{}",
            event.step_seq,
            event.actor.name(),
            event.decision,
            if event.terminal { " (terminal)" } else { "" }
        );
        for message in &event.messages {
            println!("  > {}", message.content.lines().next().unwrap_or(""));
        }
    }

    // The thread is durable: a fresh run against the same id picks up
    // from the latest checkpoint (here: everything already complete).
    let events = engine.resume_run(thread_id).await?.collect().await;
    println!("\nresume produced {} event(s); run already complete", events.len());

    Ok(())
}
