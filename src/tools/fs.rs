//! Filesystem tools: read, write, and list.

use std::path::Path;

use serde_json::json;
use tokio::fs;

use super::{truncate_output, Tool, ToolFuture};

/// Largest file body returned to the model before truncation kicks in.
const READ_LIMIT_CHARS: usize = 50_000;

fn required_str(args: &serde_json::Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing required argument '{key}'"))
}

// ── read_file ─────────────────────────────────────────────────────────────────

pub struct ReadFileTool;

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file at the given path."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path of the file to read"}
            },
            "required": ["path"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        Box::pin(async move {
            let path = required_str(&args, "path")?;
            if !Path::new(&path).is_file() {
                return Err(format!("File not found: {path}"));
            }
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| format!("could not read {path}: {e}"))?;
            Ok(truncate_output(content, READ_LIMIT_CHARS, "file"))
        })
    }
}

// ── write_file ────────────────────────────────────────────────────────────────

pub struct WriteFileTool;

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text content to a file, creating parent directories as needed. \
         Overwrites any existing content."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path of the file to write"},
                "content": {"type": "string", "description": "Full text content to write"}
            },
            "required": ["path", "content"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        Box::pin(async move {
            let path = required_str(&args, "path")?;
            let content = required_str(&args, "content")?;

            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| format!("could not create directories for {path}: {e}"))?;
                }
            }

            fs::write(&path, &content)
                .await
                .map_err(|e| format!("could not write {path}: {e}"))?;

            Ok(format!("Successfully wrote {} characters to {path}", content.chars().count()))
        })
    }
}

// ── list_directory ────────────────────────────────────────────────────────────

pub struct ListDirectoryTool;

impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory with sizes. Directories first, hidden entries skipped."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory to list (defaults to '.')"}
            }
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        Box::pin(async move {
            let path = args
                .get("path")
                .and_then(|v| v.as_str())
                .unwrap_or(".")
                .to_string();

            if !Path::new(&path).is_dir() {
                return Err(format!("Directory not found: {path}"));
            }

            let mut dirs: Vec<String> = Vec::new();
            let mut files: Vec<(String, u64)> = Vec::new();

            let mut entries = fs::read_dir(&path)
                .await
                .map_err(|e| format!("could not list {path}: {e}"))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| format!("could not list {path}: {e}"))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| format!("could not stat {name}: {e}"))?;
                if meta.is_dir() {
                    dirs.push(name);
                } else {
                    files.push((name, meta.len()));
                }
            }

            dirs.sort();
            files.sort_by(|a, b| a.0.cmp(&b.0));

            let mut lines: Vec<String> = dirs.into_iter().map(|d| format!("[DIR]  {d}")).collect();
            lines.extend(files.into_iter().map(|(f, size)| format!("[FILE] {f} ({})", human_size(size))));

            if lines.is_empty() {
                Ok(format!("{path} is empty"))
            } else {
                Ok(lines.join("\n"))
            }
        })
    }
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn read_missing_file_reports_path() {
        let err = ReadFileTool
            .call(json!({"path": "/definitely/not/here.txt"}))
            .await
            .unwrap_err();
        assert_eq!(err, "File not found: /definitely/not/here.txt");
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/note.txt");
        let path_str = path.to_string_lossy().to_string();

        let msg = WriteFileTool
            .call(json!({"path": path_str, "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(msg, format!("Successfully wrote 5 characters to {path_str}"));

        let body = ReadFileTool.call(json!({"path": path_str})).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn read_truncates_huge_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        tokio::fs::write(&path, "a".repeat(READ_LIMIT_CHARS + 10)).await.unwrap();

        let body = ReadFileTool
            .call(json!({"path": path.to_string_lossy()}))
            .await
            .unwrap();
        assert!(body.contains("[truncated, file is"));
        assert!(body.len() < READ_LIMIT_CHARS + 100);
    }

    #[tokio::test]
    async fn list_sorts_dirs_first_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "bb").await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "a").await.unwrap();
        tokio::fs::write(dir.path().join(".hidden"), "x").await.unwrap();

        let listing = ListDirectoryTool
            .call(json!({"path": dir.path().to_string_lossy()}))
            .await
            .unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "[DIR]  sub");
        assert!(lines[1].starts_with("[FILE] a.txt"));
        assert!(lines[2].starts_with("[FILE] b.txt"));
        assert!(!listing.contains(".hidden"));
    }

    #[test]
    fn sizes_format_by_magnitude() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[tokio::test]
    async fn missing_argument_is_an_error() {
        let err = ReadFileTool.call(json!({})).await.unwrap_err();
        assert!(err.contains("'path'"));
    }
}
