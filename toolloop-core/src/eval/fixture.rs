//! Evaluation cases
//!
//! A case names the user input, the tools the agent may use, and what the
//! agent is expected to do with them. Case files are JSON or YAML, holding
//! either a bare list of cases or a suite object:
//!
//! ```yaml
//! name: file-tools
//! cases:
//!   - name: list-tmp
//!     input: List files in /tmp
//!     tools: [list_files, read_file, delete_file]
//!     expected_tools: [list_files]
//!     forbidden_tools: [delete_file]
//!     stubs:
//!       list_files:
//!         value: "[dir] a\n[file] b.txt"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, ToolloopError};

/// One evaluation scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User message sent to the agent
    pub input: String,

    /// Tools offered to the agent; empty means every tool the harness knows
    #[serde(default)]
    pub tools: Vec<String>,

    /// Tools the agent should call
    #[serde(default)]
    pub expected_tools: Vec<String>,

    /// Tools the agent must not call
    #[serde(default)]
    pub forbidden_tools: Vec<String>,

    /// Calls that must appear in this relative order
    #[serde(default)]
    pub expected_order: Vec<String>,

    /// Canned tool responses for this case, by tool name
    #[serde(default)]
    pub stubs: HashMap<String, StubResponseDef>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl EvalCase {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input: input.into(),
            tools: Vec::new(),
            expected_tools: Vec::new(),
            forbidden_tools: Vec::new(),
            expected_order: Vec::new(),
            stubs: HashMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn expect_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.expected_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn forbid_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.forbidden_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn expect_order<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.expected_order = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stub(mut self, tool: impl Into<String>, stub: StubResponseDef) -> Self {
        self.stubs.insert(tool.into(), stub);
        self
    }
}

/// A named collection of cases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalSuite {
    #[serde(default)]
    pub name: Option<String>,
    pub cases: Vec<EvalCase>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaseFile {
    Suite(EvalSuite),
    Cases(Vec<EvalCase>),
}

impl EvalSuite {
    /// Load a suite from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let file: CaseFile = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| ToolloopError::Eval(format!("{}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| ToolloopError::Eval(format!("{}: {}", path.display(), e)))?
        };

        let suite = match file {
            CaseFile::Suite(suite) => suite,
            CaseFile::Cases(cases) => EvalSuite { name: None, cases },
        };
        if suite.cases.is_empty() {
            return Err(ToolloopError::Eval(format!(
                "{}: no cases defined",
                path.display()
            )));
        }
        Ok(suite)
    }
}

/// Canned response for a stub tool, as written in a case file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StubResponseDef {
    /// Value returned on success; strings are passed through verbatim
    #[serde(default)]
    pub value: Option<Value>,

    /// Error message; takes precedence over `value`
    #[serde(default)]
    pub error: Option<String>,

    /// Delay to simulate (ms)
    #[serde(default)]
    pub delay_ms: u64,
}

impl StubResponseDef {
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}
