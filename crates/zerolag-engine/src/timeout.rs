//! Pending timeout resolution.
//!
//! A timeout can arrive before the command it targets, since network
//! reordering is allowed. [`TimeoutResolver`] keeps such timeouts pending
//! and retries them every update until their target shows up in the log.

use std::collections::VecDeque;

use zerolag_core::{Command, CommandPayload, TimeoutCommand};

use crate::log::CommandLog;

/// A timeout whose target was found and removed from the log.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution<P> {
    /// The resolved timeout.
    pub timeout: TimeoutCommand,
    /// The target command, still carrying its original step.
    pub command: Command<P>,
}

impl<P: CommandPayload> Resolution<P> {
    /// The target rescheduled per the timeout's policy, or `None` if it
    /// was cancelled.
    pub fn into_rescheduled(self) -> Option<Command<P>> {
        self.timeout.apply(self.command)
    }
}

/// Timeouts whose targets have not been seen yet.
#[derive(Clone, Debug, Default)]
pub struct TimeoutResolver {
    pending: VecDeque<TimeoutCommand>,
    cap: Option<usize>,
}

impl TimeoutResolver {
    /// A resolver that keeps every pending timeout until it resolves.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that keeps at most `cap` pending timeouts, discarding
    /// the oldest first. `None` is unbounded.
    pub fn with_cap(cap: Option<usize>) -> Self {
        Self {
            pending: VecDeque::new(),
            cap,
        }
    }

    /// Queue a timeout. Returns the timeout discarded to respect the cap.
    pub fn receive(&mut self, timeout: TimeoutCommand) -> Option<TimeoutCommand> {
        self.pending.push_back(timeout);
        match self.cap {
            Some(cap) if self.pending.len() > cap => self.pending.pop_front(),
            _ => None,
        }
    }

    /// Try every pending timeout against `log`.
    ///
    /// Found targets are removed from the log and returned; the caller
    /// applies the policy. Unmatched timeouts stay pending.
    pub fn resolve<P: CommandPayload>(&mut self, log: &mut CommandLog<P>) -> Vec<Resolution<P>> {
        let mut resolved = Vec::new();
        self.pending.retain(|timeout| match log.take_timed_out(timeout) {
            Some(command) => {
                resolved.push(Resolution {
                    timeout: *timeout,
                    command,
                });
                false
            }
            None => true,
        });
        resolved
    }

    /// Number of unresolved timeouts.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timeout is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Unresolved timeouts, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &TimeoutCommand> {
        self.pending.iter()
    }
}
