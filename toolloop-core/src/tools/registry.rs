//! Tool registry
//!
//! Maps tool names to descriptors. Built before the agent is constructed and
//! shared immutably afterwards; lookups never fail loudly so that unknown
//! tools can be reported back to the model.

use super::tool::ToolDescriptor;
use crate::llm::ToolDefinition;
use std::collections::HashMap;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Tool with this name already exists
    #[error("Tool '{0}' is already registered")]
    DuplicateToolName(String),

    /// Tool not found
    #[error("Tool '{0}' not found")]
    NotFound(String),
}

/// Name-indexed set of tools, kept in registration order
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// # Errors
    ///
    /// Returns `DuplicateToolName` if a tool with the same name exists.
    pub fn register(&mut self, tool: ToolDescriptor) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateToolName(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register multiple tools, stopping at the first duplicate
    pub fn register_all(
        &mut self,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<(), RegistryError> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: ToolDescriptor) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A new registry holding only the named tools, in the order given.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a name that is not registered.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, RegistryError> {
        let mut subset = Self::new();
        for name in names {
            let name = name.as_ref();
            let tool = self
                .get(name)
                .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
            subset.register(tool.clone())?;
        }
        Ok(subset)
    }

    /// Definitions for the generation request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.iter().map(ToolDescriptor::definition).collect()
    }
}
