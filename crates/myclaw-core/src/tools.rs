//! Tool catalog: definitions sent to the LLM and the parse-boundary
//! validation of incoming calls.
//!
//! Incoming tool calls are duck-typed JSON objects. They are validated into
//! [`ToolInvocation`] — one variant per catalog tool — exactly once, at the
//! parse boundary; everything downstream works with the typed form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Tool schema
// ─────────────────────────────────────────────────────────────────────────────

/// JSON Schema-compatible parameter definition for a tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

/// A tool definition sent to the LLM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: ToolParameterSchema,
}

fn definition(
    name: &str,
    description: &str,
    properties: Vec<(&str, Value)>,
    required: &[&str],
) -> ToolDefinition {
    ToolDefinition {
        name: name.into(),
        description: description.into(),
        parameters: ToolParameterSchema {
            schema_type: "object".into(),
            properties: Some(
                properties
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v))
                    .collect(),
            ),
            required: Some(required.iter().map(|&r| r.to_owned()).collect()),
        },
    }
}

/// The fixed tool catalog, in the order it is presented to the model.
#[must_use]
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        definition(
            "read_file",
            "Read a text file from the workspace.",
            vec![("path", json!({"type": "string", "description": "Workspace-relative or absolute path"}))],
            &["path"],
        ),
        definition(
            "write_file",
            "Write a text file. Existing files must be read first; new files require allowCreate.",
            vec![
                ("path", json!({"type": "string", "description": "Target path"})),
                ("content", json!({"type": "string", "description": "Full file content"})),
                ("allowCreate", json!({"type": "boolean", "description": "Allow creating a file that does not exist"})),
            ],
            &["path", "content"],
        ),
        definition(
            "apply_patch",
            "Replace an exact substring in a file that was read earlier.",
            vec![
                ("path", json!({"type": "string", "description": "Target path"})),
                ("search", json!({"type": "string", "description": "Exact text to find"})),
                ("replace", json!({"type": "string", "description": "Replacement text"})),
                ("replaceAll", json!({"type": "boolean", "description": "Replace every occurrence (default: first only)"})),
            ],
            &["path", "search", "replace"],
        ),
        definition(
            "list_files",
            "List directory entries.",
            vec![("path", json!({"type": "string", "description": "Directory to list (default: workspace root)"}))],
            &[],
        ),
        definition(
            "search_workspace",
            "Case-insensitive filename search under a subtree.",
            vec![
                ("query", json!({"type": "string", "description": "Substring to match"})),
                ("subtree", json!({"type": "string", "description": "Subtree to search (default: workspace root)"})),
            ],
            &["query"],
        ),
        definition(
            "run_shell",
            "Run a shell command in the workspace. Destructive commands require approval.",
            vec![("command", json!({"type": "string", "description": "The command line to execute"}))],
            &["command"],
        ),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool result
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a tool execution. Rejections and I/O failures are `ok: false`
/// results, never errors — the turn always continues.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution succeeded.
    pub ok: bool,
    /// Tool output, or the rejection/error text.
    pub output: String,
}

impl ToolResult {
    /// Successful result.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            ok: true,
            output: output.into(),
        }
    }

    /// Failed or rejected result.
    #[must_use]
    pub fn err(output: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: output.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsed invocations
// ─────────────────────────────────────────────────────────────────────────────

/// A validated tool call, one variant per catalog tool.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolInvocation {
    /// Read a file.
    ReadFile {
        /// Target path.
        path: String,
    },
    /// Write a file.
    WriteFile {
        /// Target path.
        path: String,
        /// Full content.
        content: String,
        /// Whether a missing target may be created.
        allow_create: bool,
    },
    /// Exact-substring patch.
    ApplyPatch {
        /// Target path.
        path: String,
        /// Text to find.
        search: String,
        /// Replacement.
        replace: String,
        /// Replace every occurrence.
        replace_all: bool,
    },
    /// List a directory.
    ListFiles {
        /// Directory path.
        path: String,
    },
    /// Filename search.
    SearchWorkspace {
        /// Substring query.
        query: String,
        /// Subtree root.
        subtree: String,
    },
    /// Shell execution.
    RunShell {
        /// Command line.
        command: String,
    },
}

fn required_str(input: &Map<String, Value>, key: &str) -> Result<String, String> {
    match input.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(format!("missing required parameter: {key}")),
        Some(_) => Err(format!("invalid type for parameter: {key} (expected string)")),
    }
}

fn optional_str(input: &Map<String, Value>, key: &str, default: &str) -> String {
    match input.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => default.to_owned(),
    }
}

fn optional_bool(input: &Map<String, Value>, key: &str) -> bool {
    input.get(key).and_then(Value::as_bool).unwrap_or(false)
}

impl ToolInvocation {
    /// Validate a duck-typed tool call into its typed form.
    ///
    /// Unknown tools and missing or ill-typed fields are errors; the
    /// dispatcher turns them into `{ok:false}` tool results.
    pub fn parse(tool: &str, input: &Map<String, Value>) -> Result<Self, String> {
        match tool {
            "read_file" => Ok(Self::ReadFile {
                path: required_str(input, "path")?,
            }),
            "write_file" => Ok(Self::WriteFile {
                path: required_str(input, "path")?,
                content: match input.get("content") {
                    Some(Value::String(s)) => s.clone(),
                    _ => return Err("missing required parameter: content".into()),
                },
                allow_create: optional_bool(input, "allowCreate"),
            }),
            "apply_patch" => Ok(Self::ApplyPatch {
                path: required_str(input, "path")?,
                search: match input.get("search") {
                    Some(Value::String(s)) => s.clone(),
                    _ => return Err("missing required parameter: search".into()),
                },
                replace: match input.get("replace") {
                    Some(Value::String(s)) => s.clone(),
                    _ => return Err("missing required parameter: replace".into()),
                },
                replace_all: optional_bool(input, "replaceAll"),
            }),
            "list_files" => Ok(Self::ListFiles {
                path: optional_str(input, "path", "."),
            }),
            "search_workspace" => Ok(Self::SearchWorkspace {
                query: required_str(input, "query")?,
                subtree: optional_str(input, "subtree", "."),
            }),
            "run_shell" => Ok(Self::RunShell {
                command: required_str(input, "command")?,
            }),
            other => Err(format!("unknown tool: {other}")),
        }
    }

    /// Catalog name of this invocation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "read_file",
            Self::WriteFile { .. } => "write_file",
            Self::ApplyPatch { .. } => "apply_patch",
            Self::ListFiles { .. } => "list_files",
            Self::SearchWorkspace { .. } => "search_workspace",
            Self::RunShell { .. } => "run_shell",
        }
    }

    /// Whether this tool mutates the workspace.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::WriteFile { .. } | Self::ApplyPatch { .. })
    }

    /// Whether this is a low-value exploration call subject to
    /// duplicate suppression within one workspace version.
    #[must_use]
    pub fn is_low_value_exploration(&self) -> bool {
        match self {
            Self::ListFiles { .. } | Self::SearchWorkspace { .. } => true,
            Self::RunShell { command } => {
                let trimmed = command.trim();
                trimmed == "pwd"
                    || trimmed == "ls"
                    || trimmed.starts_with("ls ")
            }
            _ => false,
        }
    }

    /// Duplicate-suppression signature, scoped by workspace version.
    #[must_use]
    pub fn signature(&self, workspace_version: u64) -> String {
        format!(
            "{workspace_version}:{}:{}",
            self.name(),
            serde_json::to_string(&self.input_json()).unwrap_or_default()
        )
    }

    /// Re-serialize the validated input for events and signatures.
    #[must_use]
    pub fn input_json(&self) -> Map<String, Value> {
        let mut m = Map::new();
        match self {
            Self::ReadFile { path } | Self::ListFiles { path } => {
                let _ = m.insert("path".into(), json!(path));
            }
            Self::WriteFile {
                path,
                content,
                allow_create,
            } => {
                let _ = m.insert("path".into(), json!(path));
                let _ = m.insert("content".into(), json!(content));
                let _ = m.insert("allowCreate".into(), json!(allow_create));
            }
            Self::ApplyPatch {
                path,
                search,
                replace,
                replace_all,
            } => {
                let _ = m.insert("path".into(), json!(path));
                let _ = m.insert("search".into(), json!(search));
                let _ = m.insert("replace".into(), json!(replace));
                let _ = m.insert("replaceAll".into(), json!(replace_all));
            }
            Self::SearchWorkspace { query, subtree } => {
                let _ = m.insert("query".into(), json!(query));
                let _ = m.insert("subtree".into(), json!(subtree));
            }
            Self::RunShell { command } => {
                let _ = m.insert("command".into(), json!(command));
            }
        }
        m
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
