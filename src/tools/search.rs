//! Recursive text search over a directory tree.

use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::task;

use super::{Tool, ToolFuture};

const MAX_MATCHES: usize = 100;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", ".git", "venv", ".venv", "target"];

pub struct SearchFilesTool;

impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_in_files"
    }

    fn description(&self) -> &str {
        "Search for a text pattern (case-insensitive) in files under a directory. \
         Returns 'path:line: text' matches, capped at 100."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Text to search for"},
                "path": {"type": "string", "description": "Root directory (defaults to '.')"},
                "file_extension": {"type": "string", "description": "Only search files with this extension, e.g. '.rs' (optional)"}
            },
            "required": ["pattern"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        Box::pin(async move {
            let pattern = args
                .get("pattern")
                .and_then(|v| v.as_str())
                .ok_or("missing required argument 'pattern'")?
                .to_string();
            let root = PathBuf::from(args.get("path").and_then(|v| v.as_str()).unwrap_or("."));
            let extension = args
                .get("file_extension")
                .and_then(|v| v.as_str())
                .map(|e| e.to_string());

            if !root.is_dir() {
                return Err(format!("Directory not found: {}", root.display()));
            }

            // The walk is synchronous fs work; keep it off the async workers.
            task::spawn_blocking(move || search_tree(&root, &pattern, extension.as_deref()))
                .await
                .map_err(|e| format!("search task failed: {e}"))?
        })
    }
}

fn search_tree(root: &Path, pattern: &str, extension: Option<&str>) -> Result<String, String> {
    let needle = pattern.to_lowercase();
    // Accept the filter with or without the leading dot.
    let suffix = extension.map(|e| {
        if e.starts_with('.') { e.to_string() } else { format!(".{e}") }
    });
    let mut matches: Vec<String> = Vec::new();
    let mut truncated = false;

    walk(root, root, &needle, suffix.as_deref(), &mut matches, &mut truncated)?;

    if matches.is_empty() {
        return Ok(format!("No matches for '{pattern}'"));
    }

    let mut out = matches.join("\n");
    if truncated {
        out.push_str(&format!("\n... [results truncated at {MAX_MATCHES} matches]"));
    }
    Ok(out)
}

fn walk(
    root: &Path,
    dir: &Path,
    needle: &str,
    suffix: Option<&str>,
    matches: &mut Vec<String>,
    truncated: &mut bool,
) -> Result<(), String> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("could not read {}: {e}", dir.display()))?;

    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if matches.len() >= MAX_MATCHES {
            *truncated = true;
            return Ok(());
        }

        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();

        if path.is_dir() {
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk(root, &path, needle, suffix, matches, truncated)?;
        } else if !name.starts_with('.') {
            if let Some(suffix) = suffix {
                if !name.ends_with(suffix) {
                    continue;
                }
            }
            // Binary files fail the UTF-8 read and are silently skipped.
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let rel = path.strip_prefix(root).unwrap_or(&path).display().to_string();
            for (lineno, line) in content.lines().enumerate() {
                if line.to_lowercase().contains(needle) {
                    matches.push(format!("{rel}:{}: {}", lineno + 1, line.trim()));
                    if matches.len() >= MAX_MATCHES {
                        *truncated = true;
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}
