//! Integration tests for the tools module

use super::*;
use crate::llm::ToolCallRequest;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn echo_tool() -> ToolDescriptor {
    ToolDescriptor::from_fn(
        "echo",
        "Echoes input back",
        ToolSchema::strings(&[("message", "Text to echo")]),
        |args: Value| async move { Ok(args["message"].as_str().unwrap_or_default().to_string()) },
    )
}

fn failing_tool(name: &str, message: &'static str) -> ToolDescriptor {
    ToolDescriptor::from_fn(name, "Always fails", ToolSchema::empty(), move |_| async move {
        Err(ToolError::execution(message))
    })
}

fn slow_tool() -> ToolDescriptor {
    ToolDescriptor::from_fn("slow", "Sleeps", ToolSchema::empty(), |_| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok("finished".to_string())
    })
}

fn provider_tool() -> ToolDescriptor {
    ToolDescriptor::provider(
        ToolMetadata::new("web_search", "Search the web"),
        ToolSchema::empty(),
    )
}

fn executor(tools: Vec<ToolDescriptor>) -> ToolExecutor {
    let mut registry = ToolRegistry::new();
    registry.register_all(tools).unwrap();
    ToolExecutor::new(Arc::new(registry))
}

#[test]
fn test_registry_rejects_duplicate_names() {
    let mut registry = ToolRegistry::new();
    registry.register(echo_tool()).unwrap();

    let err = registry.register(echo_tool()).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateToolName("echo".to_string()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_registry_lookup_never_fails() {
    let registry = ToolRegistry::new().with_tool(echo_tool()).unwrap();
    assert!(registry.get("echo").is_some());
    assert!(registry.get("frobnicate").is_none());
}

#[test]
fn test_registry_subset_preserves_requested_order() {
    let registry = ToolRegistry::new()
        .with_tool(echo_tool())
        .unwrap()
        .with_tool(failing_tool("write_file", "disk full"))
        .unwrap()
        .with_tool(provider_tool())
        .unwrap();

    let subset = registry.subset(&["web_search", "echo"]).unwrap();
    assert_eq!(subset.names(), vec!["web_search", "echo"]);

    let definitions = subset.definitions();
    assert!(definitions[0].provider_executed);
    assert!(!definitions[1].provider_executed);

    assert!(matches!(
        registry.subset(&["missing"]),
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_execute_success() {
    let executor = executor(vec![echo_tool()]);
    let call = ToolCallRequest::new("c1", "echo", json!({"message": "hello"}));

    let execution = executor.execute(&call, None).await;

    assert_eq!(
        execution,
        ToolExecution::Completed(ToolOutcome::Ok("hello".to_string()))
    );
}

#[tokio::test]
async fn test_unknown_tool_is_text_not_error() {
    let executor = executor(vec![echo_tool()]);
    let call = ToolCallRequest::new("c1", "frobnicate", json!({"anything": [1, 2, 3]}));

    let execution = executor.execute(&call, None).await;

    assert_eq!(execution, ToolExecution::UnknownTool("frobnicate".to_string()));
    assert!(execution.to_model_text(&call.name).contains("Unknown tool"));
}

#[tokio::test]
async fn test_handler_failure_becomes_error_text() {
    let executor = executor(vec![failing_tool("write_file", "disk full")]);
    let call = ToolCallRequest::new("c1", "write_file", json!({}));

    let execution = executor.execute(&call, None).await;

    assert!(execution.is_error());
    let text = execution.to_model_text(&call.name);
    assert!(text.starts_with("Error executing write_file:"));
    assert!(text.contains("disk full"));
}

#[tokio::test]
async fn test_provider_tool_is_not_executed_locally() {
    let executor = executor(vec![provider_tool()]);
    let call = ToolCallRequest::new("c1", "web_search", json!({"query": "rust"}));

    assert!(executor.is_provider_tool("web_search"));
    assert_eq!(
        executor.execute(&call, None).await,
        ToolExecution::ProviderExecuted
    );
}

#[tokio::test]
async fn test_missing_required_argument() {
    let executor = executor(vec![echo_tool()]);
    let call = ToolCallRequest::new("c1", "echo", json!({}));

    let execution = executor.execute(&call, None).await;

    assert!(execution.is_error());
    assert!(execution.to_model_text("echo").contains("message"));
}

#[tokio::test]
async fn test_validation_can_be_disabled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let tool = ToolDescriptor::from_fn(
        "count",
        "Counts calls",
        ToolSchema::strings(&[("x", "ignored")]),
        move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("counted".to_string())
            }
        },
    );
    let registry = Arc::new(ToolRegistry::new().with_tool(tool).unwrap());
    let executor =
        ToolExecutor::with_config(registry, ToolExecutorConfig::new().with_validation(false));

    executor
        .execute(&ToolCallRequest::new("c1", "count", json!({})), None)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tool_timeout() {
    let registry = Arc::new(ToolRegistry::new().with_tool(slow_tool()).unwrap());
    let config = ToolExecutorConfig::new().with_tool_timeout("slow", Duration::from_millis(50));
    let executor = ToolExecutor::with_config(registry, config);

    let execution = executor
        .execute(&ToolCallRequest::new("c1", "slow", json!({})), None)
        .await;

    assert!(execution.is_error());
    assert!(execution.to_model_text("slow").contains("timed out"));
}

#[tokio::test]
async fn test_cancelled_before_execution() {
    let executor = executor(vec![echo_tool()]);
    let token = CancellationToken::new();
    token.cancel();

    let execution = executor
        .execute(
            &ToolCallRequest::new("c1", "echo", json!({"message": "hi"})),
            Some(&token),
        )
        .await;

    assert_eq!(
        execution,
        ToolExecution::Completed(ToolOutcome::Err("cancelled".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_execution() {
    let registry = Arc::new(ToolRegistry::new().with_tool(slow_tool()).unwrap());
    let executor = ToolExecutor::with_config(registry, ToolExecutorConfig::new().with_timeout(None));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let execution = executor
        .execute(&ToolCallRequest::new("c1", "slow", json!({})), Some(&token))
        .await;

    assert!(execution.to_model_text("slow").contains("cancelled"));
}

fn panicking_tool() -> ToolDescriptor {
    ToolDescriptor::from_fn("boom", "Panics on bad input", ToolSchema::empty(), |args: Value| async move {
        let path = args["path"].as_str().unwrap();
        Ok(path.to_string())
    })
}

#[tokio::test]
async fn test_handler_panic_becomes_error_outcome() {
    let executor = executor(vec![panicking_tool(), echo_tool()]);

    let execution = executor
        .execute(&ToolCallRequest::new("c1", "boom", json!({})), None)
        .await;

    assert!(execution.is_error());
    let text = execution.to_model_text("boom");
    assert!(text.starts_with("Error executing boom:"), "got {}", text);
    assert!(text.contains("tool panicked"));

    // The executor stays usable afterwards
    let next = executor
        .execute(&ToolCallRequest::new("c2", "echo", json!({"message": "still here"})), None)
        .await;
    assert_eq!(next.to_model_text("echo"), "still here");
}

#[test]
fn test_args_hash_is_stable_and_short() {
    let a = args_hash(&json!({"path": "/tmp"}));
    let b = args_hash(&json!({"path": "/tmp"}));
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);
    assert_ne!(a, args_hash(&json!({"path": "/var"})));
}

#[test]
fn test_executor_config_from_humantime() {
    let config: ToolExecutorConfig = serde_json::from_value(json!({
        "default_timeout": "30s",
        "tool_timeouts": {"run_command": "2m"}
    }))
    .unwrap();

    assert_eq!(config.timeout_for("read_file"), Some(Duration::from_secs(30)));
    assert_eq!(config.timeout_for("run_command"), Some(Duration::from_secs(120)));
    assert!(config.validate_arguments);
}
