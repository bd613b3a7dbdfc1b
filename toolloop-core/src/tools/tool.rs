//! Tool descriptors and handler trait
//!
//! A tool is a name, a description the model reads to decide applicability,
//! an input schema, and optionally a local handler. A descriptor without a
//! handler is a provider tool: the generation service runs it itself.

use super::result::ToolError;
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Tool metadata shown to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a schema from a JSON Schema value
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }

    /// Schema for a tool that takes no parameters
    pub fn empty() -> Self {
        Self {
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }

    /// Object schema with string properties, all required
    pub fn strings(fields: &[(&str, &str)]) -> Self {
        let properties: serde_json::Map<String, Value> = fields
            .iter()
            .map(|(name, description)| {
                (
                    name.to_string(),
                    serde_json::json!({ "type": "string", "description": description }),
                )
            })
            .collect();
        let required: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        Self {
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Names listed under `required`
    pub fn required_fields(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Shallow structural check of `args`: must be an object carrying every
    /// required field.
    pub fn check(&self, args: &Value) -> Result<(), ToolError> {
        let Some(object) = args.as_object() else {
            return Err(ToolError::invalid_arguments(format!(
                "expected a JSON object, got {}",
                args
            )));
        };
        let missing: Vec<&str> = self
            .required_fields()
            .into_iter()
            .filter(|field| !object.contains_key(*field))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToolError::invalid_arguments(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }
}

/// Local tool implementation.
///
/// Handlers return text on success. Failures are reported as [`ToolError`]
/// and never escape the executor.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<String, ToolError>;
}

/// Adapts an async closure into a [`ToolHandler`]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ToolError>> + Send,
{
    async fn call(&self, args: Value) -> Result<String, ToolError> {
        (self.0)(args).await
    }
}

/// Registry entry for one tool
#[derive(Clone)]
pub struct ToolDescriptor {
    pub metadata: ToolMetadata,
    pub schema: ToolSchema,
    /// `None` marks a provider tool
    pub handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolDescriptor {
    /// A tool executed locally by `handler`
    pub fn local(metadata: ToolMetadata, schema: ToolSchema, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            metadata,
            schema,
            handler: Some(handler),
        }
    }

    /// A tool the generation service executes itself
    pub fn provider(metadata: ToolMetadata, schema: ToolSchema) -> Self {
        Self {
            metadata,
            schema,
            handler: None,
        }
    }

    /// A local tool backed by an async closure
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ToolSchema,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self::local(
            ToolMetadata::new(name, description),
            schema,
            Arc::new(FnHandler(f)),
        )
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_provider_tool(&self) -> bool {
        self.handler.is_none()
    }

    /// Definition sent to the generation service
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.metadata.name.clone(),
            description: self.metadata.description.clone(),
            parameters: self.schema.parameters.clone(),
            provider_executed: self.is_provider_tool(),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.metadata.name)
            .field("provider", &self.is_provider_tool())
            .finish()
    }
}

#[cfg(test)]
mod tool_tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_fn_handler() {
        let tool = ToolDescriptor::from_fn(
            "echo",
            "Echoes input back",
            ToolSchema::strings(&[("message", "Text to echo")]),
            |args: Value| async move {
                Ok(args["message"].as_str().unwrap_or_default().to_string())
            },
        );

        let handler = tool.handler.clone().unwrap();
        let output = handler.call(json!({"message": "hello"})).await.unwrap();

        assert_eq!(output, "hello");
        assert!(!tool.is_provider_tool());
    }

    #[test]
    fn test_provider_definition() {
        let tool = ToolDescriptor::provider(
            ToolMetadata::new("web_search", "Search the web"),
            ToolSchema::empty(),
        );
        let definition = tool.definition();
        assert!(definition.provider_executed);
        assert_eq!(definition.name, "web_search");
    }

    #[test]
    fn test_schema_check() {
        let schema = ToolSchema::strings(&[("path", "File path"), ("content", "Content")]);
        assert_eq!(schema.required_fields(), vec!["path", "content"]);
        assert!(schema.check(&json!({"path": "a", "content": "b"})).is_ok());

        let err = schema.check(&json!({"path": "a"})).unwrap_err();
        assert!(err.message.contains("content"));

        assert!(schema.check(&json!("not an object")).is_err());
        assert!(ToolSchema::empty().check(&json!({})).is_ok());
    }
}
