//! Built-in tools.
//!
//! File tools are confined to a sandbox root; paths that escape it are
//! rejected before any IO. The search tool calls an HTTP search API
//! when a key is configured and serves canned results otherwise, so
//! offline runs still exercise the directive path end to end.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use cadre_core::directive::{Tool, ToolError, ToolRegistry};

fn arg_str(args: &Value, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ToolError::InvalidArgs(format!("missing '{key}'")))
}

/// Resolve a caller-supplied relative path inside the sandbox root,
/// rejecting absolute paths and parent-dir traversal.
fn resolve_sandboxed(root: &Path, path: &str) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(path);
    if candidate.is_absolute()
        || candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ToolError::InvalidArgs(format!(
            "access denied: '{path}' escapes the sandbox root"
        )));
    }
    Ok(root.join(candidate))
}

/// List files and directories under a path relative to the sandbox
/// root.
pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories at the given relative path."
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        let target = resolve_sandboxed(&self.root, &path)?;

        let mut entries = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| ToolError::Execution(format!("listing '{path}': {e}")))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        if names.is_empty() {
            Ok("(empty directory)".to_string())
        } else {
            Ok(names.join("\n"))
        }
    }
}

/// Read the contents of a file inside the sandbox root.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given relative path."
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = arg_str(&args, "path")?;
        let target = resolve_sandboxed(&self.root, &path)?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| ToolError::Execution(format!("reading '{path}': {e}")))
    }
}

/// Write content to a file inside the sandbox root, creating parent
/// directories as needed. Overwrites existing files.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given relative path (overwrites)."
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let path = arg_str(&args, "path")?;
        let content = arg_str(&args, "content")?;
        let target = resolve_sandboxed(&self.root, &path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Execution(e.to_string()))?;
        }
        tokio::fs::write(&target, content.as_bytes())
            .await
            .map_err(|e| ToolError::Execution(format!("writing '{path}': {e}")))?;
        Ok(format!("Successfully wrote to '{path}'."))
    }
}

/// Web search. With an API key it queries an HTTP search endpoint;
/// without one it serves canned results so runs stay reproducible
/// offline.
pub struct SearchTool {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SearchTool {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn canned_results(query: &str) -> String {
        format!(
            "Canned search results for '{query}':\n\
             - [Result 1] No search API key is configured; these results are placeholders.\n\
             - [Result 2] Configure the search key environment variable for live results.\n\
             - [Result 3] The run otherwise proceeds normally."
        )
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Web search for up-to-date information."
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let query = arg_str(&args, "query")?;

        let Some(api_key) = &self.api_key else {
            return Ok(Self::canned_results(&query));
        };

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": 3,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ToolError::Execution(format!(
                "search returned HTTP {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// Build the default tool registry rooted at `sandbox_root`.
pub fn builtin_registry(
    sandbox_root: impl Into<PathBuf>,
    search_endpoint: impl Into<String>,
    search_api_key: Option<String>,
) -> ToolRegistry {
    let root = sandbox_root.into();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(search_endpoint, search_api_key)));
    registry.register(Arc::new(ListDirectoryTool::new(root.clone())));
    registry.register(Arc::new(ReadFileTool::new(root.clone())));
    registry.register(Arc::new(WriteFileTool::new(root)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    #[test]
    fn test_write_then_read_round_trip() {
        block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let write = WriteFileTool::new(dir.path());
            let read = ReadFileTool::new(dir.path());

            let out = write
                .invoke(json!({"path": "notes/hello.txt", "content": "Hello"}))
                .await
                .unwrap();
            assert_eq!(out, "Successfully wrote to 'notes/hello.txt'.");

            let content = read
                .invoke(json!({"path": "notes/hello.txt"}))
                .await
                .unwrap();
            assert_eq!(content, "Hello");
        });
    }

    #[test]
    fn test_list_directory_sorts_entries() {
        block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let write = WriteFileTool::new(dir.path());
            write
                .invoke(json!({"path": "b.txt", "content": ""}))
                .await
                .unwrap();
            write
                .invoke(json!({"path": "a.txt", "content": ""}))
                .await
                .unwrap();

            let list = ListDirectoryTool::new(dir.path());
            let out = list.invoke(json!({"path": "."})).await.unwrap();
            assert_eq!(out, "a.txt\nb.txt");
        });
    }

    #[test]
    fn test_path_escape_is_rejected() {
        block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let read = ReadFileTool::new(dir.path());

            let err = read
                .invoke(json!({"path": "../outside.txt"}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgs(_)));

            let err = read
                .invoke(json!({"path": "/etc/hostname"}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgs(_)));
        });
    }

    #[test]
    fn test_search_without_key_serves_canned_results() {
        block_on(async {
            let search = SearchTool::new("https://example.invalid/search", None);
            let out = search.invoke(json!({"query": "goal DAG"})).await.unwrap();
            assert!(out.contains("Canned search results for 'goal DAG'"));
        });
    }

    #[test]
    fn test_missing_required_arg_is_invalid() {
        block_on(async {
            let search = SearchTool::new("https://example.invalid/search", None);
            let err = search.invoke(json!({})).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgs(_)));
        });
    }
}
