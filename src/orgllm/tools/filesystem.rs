//! Workspace file tool.
//!
//! Gives an agent read/write access to its own workspace directory and
//! nothing else: every path is resolved against the workspace root and
//! rejected if it escapes it. Each successful operation appends one
//! SHA-256 hash-chained line to `file_logger.txt` inside the workspace, so
//! the audit trail of an agent's file activity is tamper-evident.

use crate::orgllm::tool_protocol::{
    ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Name of the append-only audit log kept in each workspace.
pub const AUDIT_LOG_FILE: &str = "file_logger.txt";

/// Errors that can occur during workspace file operations
#[derive(Debug, Clone)]
pub enum FileSystemError {
    /// Path escapes the workspace root.
    PathTraversal(String),
    /// Path does not exist.
    NotFound(String),
    /// A directory was given where a file was expected.
    IsDirectory(String),
    /// IO error with context.
    IOError(String),
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::PathTraversal(msg) => {
                write!(f, "Path traversal attempt blocked: {}", msg)
            }
            FileSystemError::NotFound(msg) => write!(f, "File not found: {}", msg),
            FileSystemError::IsDirectory(msg) => write!(f, "Is a directory: {}", msg),
            FileSystemError::IOError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl Error for FileSystemError {}

/// Workspace-rooted file operations with a hash-chained audit log.
pub struct WorkspaceFiles {
    root: PathBuf,
    /// Hash of the last audit line, hex. Empty before the first entry.
    last_audit_hash: Mutex<String>,
}

impl WorkspaceFiles {
    /// Open the tool over a workspace directory, creating it if needed and
    /// resuming the audit chain from the existing log tail.
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let mut last_hash = String::new();
        let log_path = root.join(AUDIT_LOG_FILE);
        if log_path.exists() {
            let content = fs::read_to_string(&log_path)?;
            if let Some(line) = content.lines().rev().find(|l| !l.trim().is_empty()) {
                if let Some(hash) = line.rsplit('|').next() {
                    last_hash = hash.trim().to_string();
                }
            }
        }

        Ok(Self {
            root,
            last_audit_hash: Mutex::new(last_hash),
        })
    }

    /// The workspace root all operations are confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path inside the workspace, refusing escapes.
    fn resolve(&self, relative: &str) -> Result<PathBuf, FileSystemError> {
        let candidate = Path::new(relative);
        if candidate.is_absolute() {
            return Err(FileSystemError::PathTraversal(relative.to_string()));
        }
        let mut resolved = self.root.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(FileSystemError::PathTraversal(relative.to_string())),
            }
        }
        Ok(resolved)
    }

    /// Append one hash-chained line to the audit log.
    fn audit(&self, operation: &str, relative: &str) {
        let mut last_hash = match self.last_audit_hash.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let timestamp = Utc::now().to_rfc3339();
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}|{}|{}", timestamp, operation, relative, *last_hash).as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        let line = format!("{}|{}|{}|{}\n", timestamp, operation, relative, hash);
        let log_path = self.root.join(AUDIT_LOG_FILE);
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        match appended {
            Ok(()) => *last_hash = hash,
            Err(e) => log::warn!("file audit log append failed: {}", e),
        }
    }

    /// Read a file's content.
    pub fn read_file(&self, relative: &str) -> Result<String, FileSystemError> {
        let path = self.resolve(relative)?;
        if path.is_dir() {
            return Err(FileSystemError::IsDirectory(relative.to_string()));
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FileSystemError::NotFound(relative.to_string()),
                _ => FileSystemError::IOError(e.to_string()),
            })?;
        self.audit("read", relative);
        Ok(content)
    }

    /// Write (create or overwrite) a file.
    pub fn write_file(&self, relative: &str, text: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FileSystemError::IOError(e.to_string()))?;
        }
        fs::write(&path, text).map_err(|e| FileSystemError::IOError(e.to_string()))?;
        self.audit("write", relative);
        Ok(())
    }

    /// Append text to a file, creating it if missing.
    pub fn append_file(&self, relative: &str, text: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FileSystemError::IOError(e.to_string()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(text.as_bytes()))
            .map_err(|e| FileSystemError::IOError(e.to_string()))?;
        self.audit("append", relative);
        Ok(())
    }

    /// Delete a file.
    pub fn delete_file(&self, relative: &str) -> Result<(), FileSystemError> {
        let path = self.resolve(relative)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileSystemError::NotFound(relative.to_string()),
            _ => FileSystemError::IOError(e.to_string()),
        })?;
        self.audit("delete", relative);
        Ok(())
    }

    /// List entries of a directory inside the workspace.
    pub fn list_files(&self, relative: &str) -> Result<Vec<String>, FileSystemError> {
        let path = self.resolve(relative)?;
        let entries = fs::read_dir(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileSystemError::NotFound(relative.to_string()),
            _ => FileSystemError::IOError(e.to_string()),
        })?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Verify the audit log's hash chain end to end.
    pub fn verify_audit_log(&self) -> bool {
        let log_path = self.root.join(AUDIT_LOG_FILE);
        let content = match fs::read_to_string(&log_path) {
            Ok(c) => c,
            Err(_) => return true, // no log yet
        };
        let mut prev_hash = String::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.splitn(4, '|').collect();
            if fields.len() != 4 {
                return false;
            }
            let mut hasher = Sha256::new();
            hasher.update(format!("{}|{}|{}|{}", fields[0], fields[1], fields[2], prev_hash));
            let expected = format!("{:x}", hasher.finalize());
            if fields[3] != expected {
                return false;
            }
            prev_hash = expected;
        }
        true
    }
}

/// [`ToolProtocol`] adapter exposing workspace file operations as tools.
pub struct FileToolProtocol {
    files: WorkspaceFiles,
}

impl FileToolProtocol {
    pub fn new(files: WorkspaceFiles) -> Self {
        Self { files }
    }
}

fn str_param(parameters: &serde_json::Value, name: &str) -> Result<String, String> {
    parameters
        .get(name)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("missing required parameter '{}'", name))
}

#[async_trait]
impl ToolProtocol for FileToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let result = match tool_name {
            "read_file" => {
                let file = match str_param(&parameters, "file") {
                    Ok(f) => f,
                    Err(e) => return Ok(ToolResult::failure(e)),
                };
                self.files
                    .read_file(&file)
                    .map(|content| ToolResult::success(serde_json::json!(content)))
            }
            "write_file" => {
                let (file, text) = match (
                    str_param(&parameters, "file"),
                    str_param(&parameters, "text"),
                ) {
                    (Ok(f), Ok(t)) => (f, t),
                    (Err(e), _) | (_, Err(e)) => return Ok(ToolResult::failure(e)),
                };
                self.files.write_file(&file, &text).map(|_| {
                    ToolResult::success(serde_json::json!(format!("Wrote {} bytes to {}", text.len(), file)))
                })
            }
            "append_file" => {
                let (file, text) = match (
                    str_param(&parameters, "file"),
                    str_param(&parameters, "text"),
                ) {
                    (Ok(f), Ok(t)) => (f, t),
                    (Err(e), _) | (_, Err(e)) => return Ok(ToolResult::failure(e)),
                };
                self.files
                    .append_file(&file, &text)
                    .map(|_| ToolResult::success(serde_json::json!(format!("Appended to {}", file))))
            }
            "delete_file" => {
                let file = match str_param(&parameters, "file") {
                    Ok(f) => f,
                    Err(e) => return Ok(ToolResult::failure(e)),
                };
                self.files
                    .delete_file(&file)
                    .map(|_| ToolResult::success(serde_json::json!(format!("Deleted {}", file))))
            }
            "list_files" => {
                let directory = str_param(&parameters, "directory").unwrap_or_else(|_| ".".into());
                self.files
                    .list_files(&directory)
                    .map(|names| ToolResult::success(serde_json::json!(names)))
            }
            other => {
                return Ok(ToolResult::failure(format!("unknown file tool '{}'", other)));
            }
        };

        Ok(result.unwrap_or_else(|e| ToolResult::failure(e.to_string())))
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        let file_param = || {
            ToolParameter::new("file", ToolParameterType::String)
                .with_description("Path relative to your workspace")
                .required()
        };
        Ok(vec![
            ToolMetadata::new("read_file", "Read a file from your workspace")
                .with_parameter(file_param()),
            ToolMetadata::new("write_file", "Write a file in your workspace")
                .with_parameter(file_param())
                .with_parameter(ToolParameter::new("text", ToolParameterType::String).required()),
            ToolMetadata::new("append_file", "Append text to a workspace file")
                .with_parameter(file_param())
                .with_parameter(ToolParameter::new("text", ToolParameterType::String).required()),
            ToolMetadata::new("delete_file", "Delete a workspace file")
                .with_parameter(file_param()),
            ToolMetadata::new("list_files", "List files in a workspace directory").with_parameter(
                ToolParameter::new("directory", ToolParameterType::String)
                    .with_description("Directory relative to your workspace, defaults to '.'"),
            ),
        ])
    }

    fn protocol_name(&self) -> &str {
        "files"
    }
}
