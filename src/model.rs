//! Core data model: messages, actions, and the nodes of an action tree.
//!
//! A decoded record becomes a [`Message`] once it has been classified as a
//! plain message, the start of an action, or the end of one. Actions are
//! folded from those messages and nest into trees of [`Node`]s.

mod action;
mod level;
mod message;

pub use action::{Action, ActionError, Node, Status};
pub use level::TaskLevel;
pub use message::{Message, MessageKind, ParseError, classify};

/// Record keys with structural meaning. Everything else is payload.
pub mod keys {
    pub const TASK_UUID: &str = "task_uuid";
    pub const TASK_LEVEL: &str = "task_level";
    pub const TIMESTAMP: &str = "timestamp";
    pub const ACTION_TYPE: &str = "action_type";
    pub const ACTION_STATUS: &str = "action_status";
    pub const MESSAGE_TYPE: &str = "message_type";
}
