//! Actions: a start message, its content, and (once finished) its end.
//!
//! An [`Action`] is a value. Appending content consumes the action and
//! returns the extended one, so a half-built action is never shared.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::Serialize;

use super::{Message, MessageKind};

/// Where an action is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Started,
    Succeeded,
    Failed,
}

impl Status {
    /// Terminal statuses end an action; nothing may follow them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown action status '{other}'")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One position in an action tree: a bare message or a nested action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Message(Message),
    Action(Action),
}

impl Node {
    pub fn task_uuid(&self) -> Option<&str> {
        match self {
            Self::Message(message) => message.task_uuid(),
            Self::Action(action) => action.task_uuid(),
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(message) => Some(message),
            Self::Action(_) => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Action(action) => Some(action),
            Self::Message(_) => None,
        }
    }
}

impl From<Message> for Node {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Action> for Node {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => fmt::Display::fmt(message, f),
            Self::Action(action) => fmt::Display::fmt(action, f),
        }
    }
}

/// Errors that can occur while assembling actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("cannot build an action from no messages")]
    NoMessages,

    #[error("tried to start an action with non-start message {message}")]
    NotStarted { message: Box<Message> },

    #[error("tried to append {entry} to {action}, but it already ended")]
    AlreadyEnded { action: Box<Action>, entry: Box<Node> },

    #[error("tried to end {action} with {message}, but their types are incompatible")]
    IncompatibleEnd {
        action: Box<Action>,
        message: Box<Message>,
    },

    #[error(
        "expected {entry} to be in task {}, but it is in task {}",
        describe_task(.expected.as_deref()),
        describe_task(.found.as_deref())
    )]
    DifferentTasks {
        expected: Option<String>,
        found: Option<String>,
        entry: Box<Node>,
    },

    #[error("got end message {message} with no action in progress")]
    EndWithoutStart { message: Box<Message> },

    #[error("tried to append start message {message} to already-started {action}")]
    AlreadyStarted {
        action: Box<Action>,
        message: Box<Message>,
    },
}

fn describe_task(task_uuid: Option<&str>) -> &str {
    task_uuid.unwrap_or("<no task>")
}

/// A unit of nested work: opened by a start message, optionally closed by
/// an end message of the same type, holding everything logged in between.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    entry_type: String,
    task_uuid: Option<String>,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    status: Status,
    messages: Vec<Node>,
}

impl Action {
    /// Fold an ordered run of one task's messages into a single action.
    ///
    /// The first message must start the action. This does not resolve
    /// nesting: a second start is an error here. See [`crate::nest`] for
    /// building trees.
    pub fn new<I>(messages: I) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = Message>,
    {
        let mut messages = messages.into_iter();
        let first = messages.next().ok_or(ActionError::NoMessages)?;
        messages.try_fold(Self::start(first)?, Self::append)
    }

    /// Open a new, empty action from a start message.
    pub fn start(message: Message) -> Result<Self, ActionError> {
        let entry_type = message.entry_type().map(str::to_owned);
        let (MessageKind::ActionStart, Some(entry_type)) = (message.kind(), entry_type) else {
            return Err(ActionError::NotStarted {
                message: Box::new(message),
            });
        };

        Ok(Self {
            entry_type,
            task_uuid: message.task_uuid().map(str::to_owned),
            start_time: message.timestamp(),
            end_time: None,
            status: Status::Started,
            messages: Vec::new(),
        })
    }

    /// Merge one more entry into this action.
    ///
    /// Plain messages and finished child actions become children. A
    /// matching end message seals the action. Anything arriving after the
    /// end, from another task, or starting a second action is rejected.
    pub fn append(mut self, entry: impl Into<Node>) -> Result<Self, ActionError> {
        let entry = entry.into();

        if self.is_ended() {
            return Err(ActionError::AlreadyEnded {
                action: Box::new(self),
                entry: Box::new(entry),
            });
        }

        if entry.task_uuid() != self.task_uuid.as_deref() {
            let found = entry.task_uuid().map(str::to_owned);
            return Err(ActionError::DifferentTasks {
                expected: self.task_uuid,
                found,
                entry: Box::new(entry),
            });
        }

        let message = match entry {
            Node::Action(_) => {
                self.messages.push(entry);
                return Ok(self);
            }
            Node::Message(message) => message,
        };

        match message.kind() {
            MessageKind::Message => {
                self.messages.push(Node::Message(message));
                Ok(self)
            }
            MessageKind::ActionStart => Err(ActionError::AlreadyStarted {
                action: Box::new(self),
                message: Box::new(message),
            }),
            MessageKind::ActionEnd(status) => {
                if message.entry_type() != Some(self.entry_type.as_str()) {
                    return Err(ActionError::IncompatibleEnd {
                        action: Box::new(self),
                        message: Box::new(message),
                    });
                }
                self.end_time = message.timestamp();
                self.status = status;
                Ok(self)
            }
        }
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn task_uuid(&self) -> Option<&str> {
        self.task_uuid.as_deref()
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Children in the order they were logged.
    pub fn messages(&self) -> &[Node] {
        &self.messages
    }

    pub fn is_ended(&self) -> bool {
        self.status.is_terminal()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = describe_task(self.task_uuid.as_deref());
        write!(f, "{} action ({task}, {})", self.entry_type, self.status)
    }
}
