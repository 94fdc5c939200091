//! Assemble structured task logs into action trees.
//!
//! Each log line is one record carrying a task identity, a hierarchical
//! position (the task level), and either a plain message or the start or
//! end of an action. Lines may arrive in any order; this crate turns them
//! back into the nested tree they describe:
//!
//! ```text
//! lines ─▶ decode ─▶ Message ─▶ to_tasks ─▶ nest ─▶ Node (Message | Action tree)
//! ```

pub mod config;
pub mod decode;
pub mod logging;
pub mod model;
pub mod nest;
pub mod pipeline;
pub mod tasks;

pub use decode::{
    DecodeError, DecodeMode, Record, Records, parse_json_stream, parse_record, parse_record_bytes,
};
pub use model::{Action, ActionError, Message, MessageKind, Node, ParseError, Status, TaskLevel};
pub use nest::{NestedActions, nest};
pub use pipeline::{Error, Forest, Task, parse_to_tasks};
pub use tasks::{Tasks, sort_by_level, to_tasks};
