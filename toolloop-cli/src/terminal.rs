//! Terminal front end: stdin approvals and streamed output

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use toolloop_core::agent::{AgentObserver, AgentOutcome};
use toolloop_core::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use toolloop_core::llm::{TokenUsage, ToolCallRequest, ToolResultPart};

/// Longest tool output echoed to the terminal
const PREVIEW_CHARS: usize = 200;

/// Line reader over stdin, shared by the prompt loop and the approval gate
#[derive(Clone)]
pub struct Input {
    lines: Arc<Mutex<Lines<BufReader<Stdin>>>>,
}

impl Input {
    pub fn stdin() -> Self {
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines())),
        }
    }

    /// Print `prompt` and read one line; `None` at end of input
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                None
            }
        }
    }
}

/// Asks the user at the terminal before each tool call
pub struct TerminalApproval {
    input: Input,
}

impl TerminalApproval {
    pub fn new(input: Input) -> Self {
        Self { input }
    }
}

#[async_trait]
impl ApprovalGate for TerminalApproval {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalDecision {
        println!();
        println!("Tool call: {}", request.tool_name);
        if !request.description.is_empty() {
            println!("  {}", request.description);
        }
        let args = serde_json::to_string_pretty(&request.arguments)
            .unwrap_or_else(|_| request.arguments.to_string());
        for line in args.lines() {
            println!("  {}", line);
        }

        let answer = self.input.read_line("Allow? [y/N] ").await;
        let approved = matches!(
            answer.as_deref().map(str::trim),
            Some("y") | Some("Y") | Some("yes")
        );
        ApprovalDecision::from(approved)
    }
}

/// Prints the run to stdout as it happens
#[derive(Default)]
pub struct TerminalObserver {
    show_usage: bool,
}

impl TerminalObserver {
    pub fn new(show_usage: bool) -> Self {
        Self { show_usage }
    }
}

fn preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    let mut preview: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if preview.len() < text.len() {
        preview.push_str(" ...");
    }
    preview
}

/// Notices arrive already bracketed
fn notice_line(notice: &str) -> String {
    format!("\n{}", notice)
}

#[async_trait]
impl AgentObserver for TerminalObserver {
    async fn on_text_delta(&self, delta: &str) {
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    }

    async fn on_tool_call_start(&self, call: &ToolCallRequest) {
        println!("\n> {} {}", call.name, call.arguments);
    }

    async fn on_tool_call_end(&self, _call: &ToolCallRequest, result: &ToolResultPart) {
        let marker = if result.is_error { "error" } else { "ok" };
        println!("< [{}] {}", marker, preview(&result.output));
    }

    async fn on_usage(&self, usage: &TokenUsage) {
        if self.show_usage {
            eprintln!(
                "[usage] prompt {} completion {} total {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
    }

    async fn on_notice(&self, notice: &str) {
        println!("{}", notice_line(notice));
    }

    async fn on_complete(&self, _outcome: &AgentOutcome) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolloop_core::agent::TRUNCATION_NOTICE;

    #[test]
    fn test_preview_truncates_multiline_output() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview("first\nsecond"), "first ...");
        let long = "x".repeat(500);
        assert_eq!(preview(&long).len(), PREVIEW_CHARS + 4);
    }

    #[test]
    fn test_notice_line_keeps_single_brackets() {
        let line = notice_line(TRUNCATION_NOTICE);
        assert!(line.trim_start().starts_with("[Stopped"));
        assert!(!line.contains("[["));
        assert!(!line.contains("]]"));
    }
}
