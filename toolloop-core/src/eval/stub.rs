//! Tool stubbing for deterministic evaluation
//!
//! Stub tools return predetermined responses and record the arguments they
//! were called with, so an evaluation never touches the filesystem or shell.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::fixture::StubResponseDef;
use crate::tools::{
    RegistryError, ToolDescriptor, ToolError, ToolHandler, ToolMetadata, ToolRegistry, ToolSchema,
};

/// Predetermined response for a stub tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub result: Result<String, String>,
    pub delay: Duration,
}

impl StubResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            result: Ok(output.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Add a simulated delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl From<&StubResponseDef> for StubResponse {
    fn from(def: &StubResponseDef) -> Self {
        let response = match (&def.error, &def.value) {
            (Some(message), _) => StubResponse::error(message.clone()),
            (None, Some(Value::String(text))) => StubResponse::success(text.clone()),
            (None, Some(value)) => StubResponse::success(value.to_string()),
            (None, None) => StubResponse::success("ok"),
        };
        response.with_delay(Duration::from_millis(def.delay_ms))
    }
}

/// A tool that replays predetermined responses.
///
/// Responses are returned in order; once they run out the last one repeats.
pub struct StubTool {
    metadata: ToolMetadata,
    schema: ToolSchema,
    responses: Vec<StubResponse>,
    call_count: AtomicUsize,
    call_history: RwLock<Vec<Value>>,
}

impl StubTool {
    /// Create a new stub tool with a single response
    pub fn new(name: impl Into<String>, response: StubResponse) -> Self {
        Self::with_responses(name, vec![response])
    }

    /// Create a stub tool with multiple responses (returned in order)
    pub fn with_responses(name: impl Into<String>, responses: Vec<StubResponse>) -> Self {
        let name = name.into();
        Self {
            metadata: ToolMetadata::new(&name, format!("Stub tool: {}", name)),
            schema: ToolSchema::empty(),
            responses,
            call_count: AtomicUsize::new(0),
            call_history: RwLock::new(Vec::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: ToolSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Get the number of times this tool has been called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Arguments passed to each call, in order
    pub async fn call_history(&self) -> Vec<Value> {
        self.call_history.read().await.clone()
    }

    pub async fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        self.call_history.write().await.clear();
    }

    /// Registry entry backed by this stub
    pub fn descriptor(self: &Arc<Self>) -> ToolDescriptor {
        ToolDescriptor::local(self.metadata.clone(), self.schema.clone(), self.clone())
    }
}

#[async_trait]
impl ToolHandler for StubTool {
    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_history.write().await.push(args);

        let response = self
            .responses
            .get(call_num)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| StubResponse::success("ok"));

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }

        response.result.map_err(ToolError::execution)
    }
}

/// Stub tools by name
#[derive(Default)]
pub struct StubRegistry {
    stubs: HashMap<String, Arc<StubTool>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stub, replacing any stub with the same name
    pub fn register(&mut self, stub: StubTool) -> Arc<StubTool> {
        let stub = Arc::new(stub);
        self.stubs.insert(stub.name().to_string(), stub.clone());
        stub
    }

    pub fn get(&self, name: &str) -> Option<Arc<StubTool>> {
        self.stubs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stubs.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stubs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Tool registry holding every stub, in name order
    pub fn to_registry(&self) -> Result<ToolRegistry, RegistryError> {
        let mut registry = ToolRegistry::new();
        for name in self.tool_names() {
            if let Some(stub) = self.stubs.get(name) {
                registry.register(stub.descriptor())?;
            }
        }
        Ok(registry)
    }

    /// Build stubs from case-file definitions
    pub fn from_defs(defs: &HashMap<String, StubResponseDef>) -> Self {
        let mut registry = Self::new();
        for (name, def) in defs {
            registry.register(StubTool::new(name, def.into()));
        }
        registry
    }
}

#[cfg(test)]
mod stub_tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_stub_tool_replays_then_repeats_last() {
        let stub = StubTool::with_responses(
            "read_file",
            vec![StubResponse::success("first"), StubResponse::error("gone")],
        );

        assert_eq!(stub.call(json!({"path": "a"})).await.unwrap(), "first");
        assert_eq!(stub.call(json!({"path": "b"})).await.unwrap_err().message, "gone");
        assert_eq!(stub.call(json!({"path": "c"})).await.unwrap_err().message, "gone");

        assert_eq!(stub.call_count(), 3);
        assert_eq!(stub.call_history().await[1]["path"], "b");

        stub.reset().await;
        assert_eq!(stub.call_count(), 0);
        assert!(stub.call_history().await.is_empty());
    }

    #[test]
    fn test_response_from_def() {
        let text: StubResponse = (&StubResponseDef::value("[file] a.txt")).into();
        assert_eq!(text.result, Ok("[file] a.txt".to_string()));

        let json_value: StubResponse = (&StubResponseDef::value(json!({"size": 3}))).into();
        assert_eq!(json_value.result, Ok("{\"size\":3}".to_string()));

        let error: StubResponse = (&StubResponseDef::error("disk full")).into();
        assert_eq!(error.result, Err("disk full".to_string()));
    }

    #[test]
    fn test_registry_is_name_ordered() {
        let mut stubs = StubRegistry::new();
        stubs.register(StubTool::new("write_file", StubResponse::success("ok")));
        stubs.register(StubTool::new("list_files", StubResponse::success("ok")));

        let registry = stubs.to_registry().unwrap();
        assert_eq!(registry.names(), vec!["list_files", "write_file"]);
        assert!(stubs.contains("write_file"));
    }
}
