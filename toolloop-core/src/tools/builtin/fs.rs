//! File tools rooted in a working directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{required_str, truncate_output};
use crate::tools::{ToolDescriptor, ToolError, ToolHandler, ToolMetadata, ToolSchema};

/// Which file operation a [`FileTool`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOp {
    Read,
    Write,
    List,
    Delete,
}

/// File operation bound to a root directory.
///
/// Relative paths resolve against the root; absolute paths are used as given.
struct FileTool {
    root: PathBuf,
    op: FileOp,
}

impl FileTool {
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    async fn read(&self, path: &Path) -> Result<String, ToolError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(truncate_output(content))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<String, ToolError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path.display()
        ))
    }

    async fn list(&self, path: &Path) -> Result<String, ToolError> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut listed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let kind = if entry.file_type().await?.is_dir() {
                "dir"
            } else {
                "file"
            };
            listed.push((entry.file_name().to_string_lossy().into_owned(), kind));
        }
        listed.sort();
        let lines: Vec<String> = listed
            .into_iter()
            .map(|(name, kind)| format!("[{}] {}", kind, name))
            .collect();

        if lines.is_empty() {
            Ok(format!("{} is empty", path.display()))
        } else {
            Ok(lines.join("\n"))
        }
    }

    async fn delete(&self, path: &Path) -> Result<String, ToolError> {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_dir() {
            return Err(ToolError::execution(format!(
                "{} is a directory",
                path.display()
            )));
        }
        tokio::fs::remove_file(path).await?;
        Ok(format!("Deleted {}", path.display()))
    }
}

#[async_trait]
impl ToolHandler for FileTool {
    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let path = self.resolve(required_str(&args, "path")?);
        debug!(op = ?self.op, path = %path.display(), "File tool");

        match self.op {
            FileOp::Read => self.read(&path).await,
            FileOp::Write => self.write(&path, required_str(&args, "content")?).await,
            FileOp::List => self.list(&path).await,
            FileOp::Delete => self.delete(&path).await,
        }
    }
}

fn file_tool(
    root: &Path,
    op: FileOp,
    name: &str,
    description: &str,
    schema: ToolSchema,
) -> ToolDescriptor {
    ToolDescriptor::local(
        ToolMetadata::new(name, description),
        schema,
        Arc::new(FileTool {
            root: root.to_path_buf(),
            op,
        }),
    )
}

/// `read_file`: return the contents of a text file
pub fn read_file(root: &Path) -> ToolDescriptor {
    file_tool(
        root,
        FileOp::Read,
        "read_file",
        "Read the contents of a text file.",
        ToolSchema::strings(&[("path", "Path of the file to read")]),
    )
}

/// `write_file`: create or overwrite a file
pub fn write_file(root: &Path) -> ToolDescriptor {
    file_tool(
        root,
        FileOp::Write,
        "write_file",
        "Write content to a file, creating parent directories and overwriting any existing file.",
        ToolSchema::strings(&[
            ("path", "Path of the file to write"),
            ("content", "Full content to write"),
        ]),
    )
}

/// `list_files`: list a directory as `[dir] name` / `[file] name` lines
pub fn list_files(root: &Path) -> ToolDescriptor {
    file_tool(
        root,
        FileOp::List,
        "list_files",
        "List the entries of a directory. Each line is '[dir] name' or '[file] name'.",
        ToolSchema::strings(&[("path", "Directory to list")]),
    )
}

/// `delete_file`: remove a single file
pub fn delete_file(root: &Path) -> ToolDescriptor {
    file_tool(
        root,
        FileOp::Delete,
        "delete_file",
        "Delete a file. Directories are not removed.",
        ToolSchema::strings(&[("path", "Path of the file to delete")]),
    )
}
