//! Built-in local tools: file access and shell commands.

mod fs;
mod shell;

pub use fs::{delete_file, list_files, read_file, write_file};
pub use shell::run_command;

use std::path::Path;

use serde_json::Value;

use super::{RegistryError, ToolError, ToolRegistry};

/// Largest tool output returned to the model, in bytes
pub const MAX_OUTPUT_BYTES: usize = 10_000;

/// Registry with every built-in tool rooted at `workdir`
pub fn registry(workdir: &Path) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register_all([
        read_file(workdir),
        write_file(workdir),
        list_files(workdir),
        delete_file(workdir),
        run_command(workdir),
    ])?;
    Ok(registry)
}

pub(crate) fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing '{}' argument", field)))
}

pub(crate) fn truncate_output(mut output: String) -> String {
    if output.len() <= MAX_OUTPUT_BYTES {
        return output;
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
    output.push_str("\n... [output truncated]");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_all_builtins() {
        let registry = registry(Path::new(".")).unwrap();
        assert_eq!(
            registry.names(),
            vec!["read_file", "write_file", "list_files", "delete_file", "run_command"]
        );
    }

    #[test]
    fn test_truncate_output_respects_char_boundaries() {
        let long = "é".repeat(MAX_OUTPUT_BYTES);
        let truncated = truncate_output(long);
        assert!(truncated.ends_with("[output truncated]"));
        assert!(truncated.len() <= MAX_OUTPUT_BYTES + 32);
    }
}
