//! Tool-invocation sub-protocol
//!
//! A worker's generated text may end with exactly one directive line:
//!
//! ```text
//! TOOL_CALL: <name> <json-object>
//! ```
//!
//! The runtime - never the worker - recognizes the suffix, dispatches
//! the named tool from the injected registry, and appends the outcome
//! to the worker's visible output. A malformed or failing call
//! degrades the message content; it never aborts the run. Keeping the
//! grammar in one place avoids divergent dialects per worker.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Prefix marking a directive line.
pub const DIRECTIVE_PREFIX: &str = "TOOL_CALL:";

/// Tool errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Tool trait - a named side-effecting capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as workers reference it in directives.
    fn name(&self) -> &str;

    /// One-line description advertised to workers.
    fn description(&self) -> &str;

    /// Invoke the tool with parsed JSON arguments.
    async fn invoke(&self, args: Value) -> Result<String, ToolError>;
}

/// Injected tool registry. The capability set is extensible; lookup is
/// by exact name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered (name, description) pairs in name order.
    pub fn catalog(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .tools
            .values()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect();
        entries.sort();
        entries
    }
}

/// A parsed directive: tool name plus the raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub raw_args: String,
}

impl Directive {
    pub fn args(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.raw_args)
    }
}

/// Recognize a directive on the last non-empty line of worker output.
pub fn parse_directive(content: &str) -> Option<Directive> {
    let line = content.lines().rev().find(|l| !l.trim().is_empty())?;
    let rest = line.trim().strip_prefix(DIRECTIVE_PREFIX)?.trim();
    let (name, raw_args) = rest.split_once(char::is_whitespace)?;
    if name.is_empty() {
        return None;
    }
    Some(Directive {
        name: name.to_string(),
        raw_args: raw_args.trim().to_string(),
    })
}

/// Dispatch the trailing directive of `content` against `registry` and
/// return the content with the outcome annotated. Content without a
/// directive passes through unchanged. All failure modes complete
/// normally with an explicit annotation.
pub async fn apply_directive(content: &str, registry: &ToolRegistry) -> String {
    let Some(directive) = parse_directive(content) else {
        return content.to_string();
    };

    let outcome = match registry.get(&directive.name) {
        None => format!("Error: Tool '{}' not found.", directive.name),
        Some(tool) => match directive.args() {
            Err(e) => format!("Error executing tool: invalid arguments: {e}"),
            Ok(args) => {
                tracing::debug!(tool = %directive.name, "dispatching tool directive");
                match tool.invoke(args).await {
                    Ok(output) => output,
                    Err(e) => format!("Error executing tool: {e}"),
                }
            }
        },
    };

    format!("{content}\n\n[Tool Result]: {outcome}")
}

/// Usage instructions advertised in a worker's role framing, derived
/// from the registered tools. Empty when the registry is.
pub fn usage_instructions(registry: &ToolRegistry) -> String {
    if registry.is_empty() {
        return String::new();
    }

    let mut text = String::from("You have access to these tools:\n");
    for (name, description) in registry.catalog() {
        let _ = writeln!(text, "- {name}: {description}");
    }
    text.push_str(
        "\nTo use a tool, your LAST line must be exactly:\n\
         TOOL_CALL: ToolName {\"arg\": \"value\"}\n\n\
         If you have completed your task or don't need tools, just respond with your report.",
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    struct SearchStub;

    #[async_trait]
    impl Tool for SearchStub {
        fn name(&self) -> &str {
            "search"
        }

        fn description(&self) -> &str {
            "Web search."
        }

        async fn invoke(&self, args: Value) -> Result<String, ToolError> {
            let query = args
                .get("query")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidArgs("missing 'query'".to_string()))?;
            Ok(format!("results for {query}"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails."
        }

        async fn invoke(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::Execution("backend offline".to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SearchStub));
        registry.register(Arc::new(FailingTool));
        registry
    }

    #[test]
    fn test_parse_directive_on_last_line() {
        let directive =
            parse_directive("I will look that up.\nTOOL_CALL: search {\"query\": \"x\"}").unwrap();
        assert_eq!(directive.name, "search");
        assert_eq!(directive.args().unwrap(), json!({"query": "x"}));
    }

    #[test]
    fn test_parse_ignores_text_without_directive() {
        assert!(parse_directive("just a report, no tools").is_none());
        assert!(parse_directive("TOOL_CALL mentioned mid-text\nfinal line").is_none());
    }

    #[test]
    fn test_registered_tool_dispatches_with_parsed_args() {
        let out = block_on(apply_directive(
            "Searching now.\nTOOL_CALL: search {\"query\": \"x\"}",
            &registry(),
        ));
        assert!(out.ends_with("[Tool Result]: results for x"));
        assert!(out.starts_with("Searching now."));
    }

    #[test]
    fn test_unregistered_tool_yields_not_found_annotation() {
        let out = block_on(apply_directive(
            "TOOL_CALL: teleport {\"to\": \"moon\"}",
            &registry(),
        ));
        assert!(out.contains("[Tool Result]: Error: Tool 'teleport' not found."));
    }

    #[test]
    fn test_malformed_json_yields_error_annotation_not_a_crash() {
        let out = block_on(apply_directive(
            "TOOL_CALL: search {not valid json",
            &registry(),
        ));
        assert!(out.contains("[Tool Result]: Error executing tool: invalid arguments"));
    }

    #[test]
    fn test_tool_failure_yields_error_annotation() {
        let out = block_on(apply_directive("TOOL_CALL: broken {}", &registry()));
        assert!(out.contains("[Tool Result]: Error executing tool"));
        assert!(out.contains("backend offline"));
    }

    #[test]
    fn test_content_without_directive_passes_through() {
        let out = block_on(apply_directive("plain report", &registry()));
        assert_eq!(out, "plain report");
    }

    #[test]
    fn test_usage_instructions_list_catalog() {
        let text = usage_instructions(&registry());
        assert!(text.contains("- broken: Always fails."));
        assert!(text.contains("- search: Web search."));
        assert!(text.contains("TOOL_CALL: ToolName"));
        assert!(usage_instructions(&ToolRegistry::new()).is_empty());
    }
}
