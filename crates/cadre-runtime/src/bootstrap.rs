//! Engine assembly from configuration.
//!
//! Builds the worker roster, tool registry, router variant, and
//! checkpoint store a `cadre.yaml` describes, and initializes tracing
//! once per process.

use std::path::PathBuf;
use std::sync::{Arc, Once};

use tracing::info;

use cadre_agents::llm::{HttpReasoningClient, HttpReasoningConfig};
use cadre_agents::router::LlmRouter;
use cadre_agents::tools::builtin_registry;
use cadre_agents::workers::{Executor, PlanMode, Planner, PlannerConfig, Specialist};
use cadre_config::{CadreConfig, CheckpointBackend, ObservabilityConfig, RoutingStrategy};
use cadre_core::checkpoint::CheckpointStore;
use cadre_core::directive::{usage_instructions, ToolRegistry};
use cadre_core::reasoning::{Reasoning, ReasoningError};
use cadre_core::supervisor::{DependencyRouter, PipelineRouter, Router};
use cadre_core::worker::WorkerRegistry;
use cadre_stores::{FileCheckpointStore, InMemoryCheckpointStore};

use crate::engine::{Engine, EngineConfig};

static TRACING_INIT: Once = Once::new();

/// Initialize the global tracing subscriber once. `RUST_LOG` wins over
/// the configured level.
pub fn init_tracing(observability: &ObservabilityConfig) {
    let fallback = match observability.log_level.trim().to_ascii_lowercase().as_str() {
        level @ ("trace" | "debug" | "info" | "warn" | "error") => level.to_string(),
        _ => "info".to_string(),
    };

    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(&fallback))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
        tracing::info!(log_level = %fallback, "tracing initialized");
    });
}

/// Build the HTTP reasoning client a config section describes. The API
/// key is read from the configured environment variable at build time.
pub fn reasoning_from_config(
    config: &cadre_config::ReasoningConfig,
) -> Result<Arc<dyn Reasoning>, ReasoningError> {
    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty());
    let client = HttpReasoningClient::new(HttpReasoningConfig {
        endpoint: config.endpoint.clone(),
        api_key,
        model: config.model.clone(),
        temperature: config.temperature,
        timeout_secs: config.timeout_secs,
    })?;
    Ok(Arc::new(client))
}

/// Assemble an engine from configuration and an injected reasoning
/// collaborator.
pub fn build_engine(config: &CadreConfig, reasoning: Arc<dyn Reasoning>) -> Engine {
    let tools = build_tools(config);
    let tool_hints = usage_instructions(&tools);

    let mut workers = WorkerRegistry::new();
    match config.routing.strategy {
        RoutingStrategy::Pipeline => {
            workers.register(Arc::new(Planner::with_config(
                reasoning.clone(),
                PlannerConfig {
                    mode: PlanMode::Narrative,
                    ..PlannerConfig::default()
                },
            )));
            workers.register(Arc::new(Executor::new(reasoning.clone())));
        }
        RoutingStrategy::Dependency | RoutingStrategy::LlmRoster => {
            workers.register(Arc::new(Planner::new(reasoning.clone())));
            workers.register(Arc::new(
                Specialist::researcher(reasoning.clone()).with_tool_instructions(&tool_hints),
            ));
            workers.register(Arc::new(
                Specialist::developer(reasoning.clone()).with_tool_instructions(&tool_hints),
            ));
            workers.register(Arc::new(Specialist::reviewer(reasoning.clone())));
            workers.register(Arc::new(Specialist::analyst(reasoning.clone())));
        }
    }

    let router: Arc<dyn Router> = match config.routing.strategy {
        RoutingStrategy::Dependency => Arc::new(DependencyRouter),
        RoutingStrategy::Pipeline => Arc::new(PipelineRouter),
        RoutingStrategy::LlmRoster => Arc::new(
            LlmRouter::new(reasoning.clone()).with_history_limit(config.runtime.history_limit),
        ),
    };

    let checkpoints: Arc<dyn CheckpointStore> = match config.checkpoints.backend {
        CheckpointBackend::Memory => Arc::new(InMemoryCheckpointStore::new()),
        CheckpointBackend::File => Arc::new(FileCheckpointStore::new(&config.checkpoints.path)),
    };

    info!(
        strategy = ?config.routing.strategy,
        backend = ?config.checkpoints.backend,
        max_steps = config.runtime.max_steps,
        "engine assembled"
    );

    Engine::new(router, workers, checkpoints)
        .with_tools(tools)
        .with_config(EngineConfig {
            max_steps: config.runtime.max_steps,
        })
}

fn build_tools(config: &CadreConfig) -> ToolRegistry {
    if !config.tools.enabled {
        return ToolRegistry::new();
    }
    let sandbox_root = config
        .tools
        .sandbox_root
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let search_key = std::env::var(&config.tools.search_api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty());
    builtin_registry(sandbox_root, config.tools.search_endpoint.clone(), search_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_agents::llm::MockReasoning;
    use cadre_core::state::Speaker;

    #[tokio::test]
    async fn test_pipeline_engine_from_config_runs_end_to_end() {
        let config = CadreConfig {
            routing: cadre_config::RoutingConfig {
                strategy: RoutingStrategy::Pipeline,
            },
            tools: cadre_config::ToolsConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let reasoning: Arc<dyn Reasoning> = Arc::new(MockReasoning::scripted(vec![
            "1. lay out the form\n2. wire validation".to_string(),
            "Executed the plan; form built and validated.".to_string(),
        ]));

        let engine = build_engine(&config, reasoning);
        let events = engine
            .start_run("thread-1", "build a login page")
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(events.len(), 3, "planner, executor, terminal");
        assert_eq!(
            events[0].actor,
            Speaker::role(cadre_core::dag::Role::Planner)
        );
        assert!(events.last().unwrap().terminal);
    }

    #[test]
    fn test_build_tools_respects_disabled_flag() {
        let config = CadreConfig {
            tools: cadre_config::ToolsConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(build_tools(&config).is_empty());

        let config = CadreConfig::default();
        let registry = build_tools(&config);
        let names: Vec<String> = registry.catalog().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["list_directory", "read_file", "search", "write_file"]
        );
    }
}
