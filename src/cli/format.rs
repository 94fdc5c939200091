//! Output formatting for CLI display.

use tasklog::model::Node;
use tasklog::pipeline::Task;

/// Render a top-level node as one JSON document.
pub(super) fn format_node(node: &Node, pretty: bool) -> Result<String, String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(node)
    } else {
        serde_json::to_string(node)
    };
    rendered.map_err(|e| format!("failed to serialize {node}: {e}"))
}

/// Format a task summary line: uuid and message count.
pub(super) fn format_task(task: &Task) -> String {
    let uuid = task.uuid().unwrap_or("<no task>");
    let count = task.messages().len();
    let noun = if count == 1 { "message" } else { "messages" };
    format!("{uuid}  {count} {noun}")
}
