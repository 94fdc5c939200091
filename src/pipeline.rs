//! End-to-end assembly: lines of JSON in, per-task action trees out.

use std::{io::BufRead, vec};

use tracing::debug;

use crate::decode::{DecodeError, DecodeMode, Record, Records};
use crate::model::{ActionError, Message, Node, ParseError};
use crate::nest::{NestedActions, nest};
use crate::tasks::to_tasks;

/// Errors that can occur anywhere between raw lines and action trees.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Parse decoded records into messages, stopping at the first failure.
pub fn read_messages<I>(records: I) -> Result<Vec<Message>>
where
    I: IntoIterator<Item = core::result::Result<Record, DecodeError>>,
{
    records
        .into_iter()
        .map(|record| Ok(Message::new(&record?)?))
        .collect()
}

/// One task's messages, sorted by task level, ready to be nested.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    uuid: Option<String>,
    messages: Vec<Message>,
}

impl Task {
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Lazily build this task's top-level results.
    pub fn nodes(self) -> NestedActions<vec::IntoIter<Message>> {
        nest(self.messages)
    }
}

/// Every task found in a log, in the order each was first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    tasks: Vec<Task>,
    skipped: usize,
}

impl Forest {
    /// Group messages into tasks. `skipped` records how many input lines
    /// were dropped on the way in.
    pub fn new<I>(messages: I, skipped: usize) -> Self
    where
        I: IntoIterator<Item = Message>,
    {
        let tasks = to_tasks(messages)
            .into_iter()
            .map(|(uuid, messages)| Task { uuid, messages })
            .collect();
        Self { tasks, skipped }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Lines dropped by tolerant decoding.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Every task's results, task by task.
    ///
    /// An error ends the results of the task it occurred in; later tasks
    /// are still assembled.
    pub fn nodes(self) -> impl Iterator<Item = Result<Node>> {
        self.tasks.into_iter().flat_map(|task| {
            debug!(
                task = task.uuid().unwrap_or("<none>"),
                messages = task.messages().len(),
                "assembling task"
            );
            task.nodes().map(|node| node.map_err(Error::from))
        })
    }
}

impl IntoIterator for Forest {
    type Item = Task;
    type IntoIter = vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

/// Decode a whole log and group it into tasks.
///
/// Every line is read and classified before any tree is built, since a
/// task's messages may be spread across the whole log.
pub fn parse_to_tasks<R: BufRead>(reader: R, mode: DecodeMode) -> Result<Forest> {
    let mut records = Records::from_reader(reader, mode);
    let messages = read_messages(records.by_ref())?;
    let count = messages.len();
    let forest = Forest::new(messages, records.skipped());
    debug!(
        messages = count,
        tasks = forest.tasks().len(),
        skipped = forest.skipped(),
        %mode,
        "grouped log into tasks"
    );
    Ok(forest)
}
