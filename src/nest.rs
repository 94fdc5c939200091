//! Nested action assembly: one task's messages in, a forest of trees out.
//!
//! [`NestedActions`] walks a task's messages in level order, keeping a
//! stack of the actions that are open at the current position:
//!
//! - a start pushes a new action;
//! - a plain message becomes a child of the innermost open action, or a
//!   top-level result when nothing is open;
//! - an end seals the innermost open action, which then becomes a child
//!   of the next one out, or a top-level result when it was outermost.
//!
//! Actions still open when the messages run out are folded into their
//! parents and reported as one unfinished top-level action.

use std::iter::FusedIterator;

use tracing::debug;

use crate::model::{Action, ActionError, Message, MessageKind, Node};

/// Build action trees from one task's messages, sorted by task level.
pub fn nest<I>(messages: I) -> NestedActions<I::IntoIter>
where
    I: IntoIterator<Item = Message>,
{
    NestedActions {
        messages: messages.into_iter(),
        stack: Vec::new(),
        done: false,
    }
}

/// Lazy iterator of top-level results for one task.
///
/// Each item is produced as soon as its outermost action ends. Working
/// memory is the stack of open actions, so it grows with nesting depth
/// rather than message count. The first error ends iteration.
pub struct NestedActions<I> {
    messages: I,
    /// Open actions, outermost first.
    stack: Vec<Action>,
    done: bool,
}

impl<I> NestedActions<I> {
    /// Number of actions currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn receive(&mut self, message: Message) -> Result<Option<Node>, ActionError> {
        match message.kind() {
            MessageKind::ActionStart => {
                self.stack.push(Action::start(message)?);
                Ok(None)
            }
            MessageKind::Message => self.settle(Node::Message(message)),
            MessageKind::ActionEnd(_) => {
                let Some(current) = self.stack.pop() else {
                    return Err(ActionError::EndWithoutStart {
                        message: Box::new(message),
                    });
                };
                let finished = current.append(message)?;
                self.settle(Node::Action(finished))
            }
        }
    }

    /// Attach a completed node to the innermost open action, or hand it
    /// back as a top-level result when nothing is open.
    fn settle(&mut self, node: Node) -> Result<Option<Node>, ActionError> {
        match self.stack.pop() {
            Some(parent) => {
                self.stack.push(parent.append(node)?);
                Ok(None)
            }
            None => Ok(Some(node)),
        }
    }

    /// Fold unfinished actions into their parents, innermost first.
    fn collapse(&mut self) -> Option<Result<Action, ActionError>> {
        let innermost = self.stack.pop()?;
        debug!(
            unfinished = self.stack.len() + 1,
            action_type = innermost.entry_type(),
            "collapsing unfinished actions"
        );
        Some(
            self.stack
                .drain(..)
                .rev()
                .try_fold(innermost, |child, parent| parent.append(child)),
        )
    }
}

impl<I> Iterator for NestedActions<I>
where
    I: Iterator<Item = Message>,
{
    type Item = Result<Node, ActionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(message) = self.messages.next() {
            match self.receive(message) {
                Ok(Some(node)) => return Some(Ok(node)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        self.collapse().map(|result| result.map(Node::Action))
    }
}

impl<I> FusedIterator for NestedActions<I> where I: Iterator<Item = Message> {}
