//! Task grouping: partition messages by task and order each task by level.

use std::{collections::HashMap, vec};

use crate::model::Message;

/// Messages grouped by `task_uuid`, each group sorted by task level.
///
/// Groups keep the order in which their task was first seen. Messages
/// without a task form a group of their own under `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tasks {
    groups: Vec<(Option<String>, Vec<Message>)>,
}

impl Tasks {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The sorted messages of one task, if any were seen.
    pub fn get(&self, task_uuid: Option<&str>) -> Option<&[Message]> {
        self.groups
            .iter()
            .find(|(uuid, _)| uuid.as_deref() == task_uuid)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &[Message])> {
        self.groups
            .iter()
            .map(|(uuid, messages)| (uuid.as_deref(), messages.as_slice()))
    }
}

impl IntoIterator for Tasks {
    type Item = (Option<String>, Vec<Message>);
    type IntoIter = vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Group messages by task.
///
/// Consumes `messages` exactly once. Within a task, messages are ordered by
/// task level; ties (including messages with no level) keep their input
/// order.
pub fn to_tasks<I>(messages: I) -> Tasks
where
    I: IntoIterator<Item = Message>,
{
    let mut index: HashMap<Option<String>, usize> = HashMap::new();
    let mut groups: Vec<(Option<String>, Vec<Message>)> = Vec::new();

    for message in messages {
        let key = message.task_uuid().map(str::to_owned);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(message);
    }

    for (_, messages) in &mut groups {
        sort_by_level(messages);
    }

    Tasks { groups }
}

/// Stable sort by task level. Messages without a level sort first.
pub fn sort_by_level(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.task_level().cmp(&b.task_level()));
}
