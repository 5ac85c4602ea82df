//! Commands, their payloads, and timeout records.

use crate::error::CommandError;
use crate::hash::Fnv1a;
use crate::id::{OrderKey, PlayerId, Priority, StepId};

/// Application-defined content of a command.
///
/// The payload's [`content_hash`](CommandPayload::content_hash) must be a
/// pure function of its value: every peer hashes the same payload to the
/// same number, which is what makes the derived [`OrderKey`] agree.
pub trait CommandPayload: Clone + Send + 'static {
    /// Deterministic hash of the payload content.
    fn content_hash(&self) -> u64;

    /// What the authority should do when this command arrives too late
    /// to be simulated at its requested step.
    fn on_timeout(&self) -> TimeoutAction {
        TimeoutAction::Cancel
    }
}

/// A unit of player intent scheduled for a specific step.
///
/// The order key is computed once at construction and recomputed when
/// the command is rescheduled, since the step is part of the content
/// hash.
///
/// # Examples
///
/// ```
/// use zerolag_core::{Command, CommandPayload, PlayerId, Priority, StepId};
///
/// #[derive(Clone)]
/// struct Jump;
/// impl CommandPayload for Jump {
///     fn content_hash(&self) -> u64 { 1 }
/// }
///
/// let low = Command::new(PlayerId(1), StepId(10), Priority::MIN, Jump);
/// let high = Command::new(PlayerId(1), StepId(10), Priority::MAX, Jump);
/// assert!(low.order_key() < high.order_key());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command<P> {
    player: PlayerId,
    step: StepId,
    priority: Priority,
    payload: P,
    content_hash: u64,
    order_key: OrderKey,
}

impl<P: CommandPayload> Command<P> {
    /// Create a command for `step`.
    pub fn new(player: PlayerId, step: StepId, priority: Priority, payload: P) -> Self {
        let content_hash = Self::hash_parts(player, step, &payload);
        Self {
            player,
            step,
            priority,
            payload,
            content_hash,
            order_key: OrderKey::new(content_hash, priority),
        }
    }

    /// Create a command from a raw priority value.
    pub fn try_new(
        player: PlayerId,
        step: StepId,
        priority: u8,
        payload: P,
    ) -> Result<Self, CommandError> {
        Ok(Self::new(player, step, Priority::new(priority)?, payload))
    }

    /// The same command moved to `step`, with its hash and key recomputed.
    pub fn rescheduled(self, step: StepId) -> Self {
        Self::new(self.player, step, self.priority, self.payload)
    }

    /// Priority is excluded from the content hash: it only affects the
    /// top bits of the order key.
    fn hash_parts(player: PlayerId, step: StepId, payload: &P) -> u64 {
        Fnv1a::new()
            .u32(player.0)
            .u64(step.0)
            .u64(payload.content_hash())
            .finish()
    }
}

impl<P> Command<P> {
    /// The issuing player.
    #[inline]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// The step this command executes in.
    #[inline]
    pub fn step(&self) -> StepId {
        self.step
    }

    /// The command's priority.
    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The application payload.
    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Deterministic hash over player, step, and payload.
    #[inline]
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// The intra-step sort key.
    #[inline]
    pub fn order_key(&self) -> OrderKey {
        self.order_key
    }
}

/// Policy applied to a command that arrived too late.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeoutAction {
    /// Move the command to a later step and execute it there.
    ExecuteLater,
    /// Drop the command permanently.
    Cancel,
}

impl TimeoutAction {
    /// Wire tag of this action.
    pub fn tag(self) -> u8 {
        match self {
            Self::ExecuteLater => 0,
            Self::Cancel => 1,
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, CommandError> {
        match tag {
            0 => Ok(Self::ExecuteLater),
            1 => Ok(Self::Cancel),
            tag => Err(CommandError::UnknownTimeoutAction { tag }),
        }
    }
}

/// Instruction to resolve a command that can no longer stay in the past.
///
/// Identifies its target by `(target_step, target_key)`. The target may
/// not have arrived yet when the timeout does, in which case resolution
/// is retried later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeoutCommand {
    /// Step the target command was scheduled for.
    pub target_step: StepId,
    /// Order key of the target command.
    pub target_key: OrderKey,
    /// What to do with the target.
    pub action: TimeoutAction,
    /// New step for [`TimeoutAction::ExecuteLater`]. Ignored for `Cancel`.
    pub reschedule_step: StepId,
}

impl TimeoutCommand {
    /// Create a timeout record.
    pub fn new(
        target_step: StepId,
        target_key: OrderKey,
        action: TimeoutAction,
        reschedule_step: StepId,
    ) -> Self {
        Self {
            target_step,
            target_key,
            action,
            reschedule_step,
        }
    }

    /// Build the timeout an authority issues for `command`.
    ///
    /// The action comes from the payload's
    /// [`on_timeout`](CommandPayload::on_timeout). A rescheduled command
    /// lands on `min_modifiable_step`, the earliest step still open for
    /// changes.
    pub fn for_command<P: CommandPayload>(command: &Command<P>, min_modifiable_step: StepId) -> Self {
        let action = command.payload().on_timeout();
        let reschedule_step = match action {
            TimeoutAction::ExecuteLater => min_modifiable_step,
            TimeoutAction::Cancel => command.step(),
        };
        Self::new(command.step(), command.order_key(), action, reschedule_step)
    }

    /// Whether `command` is the target of this timeout.
    #[inline]
    pub fn targets<P>(&self, command: &Command<P>) -> bool {
        command.step() == self.target_step && command.order_key() == self.target_key
    }

    /// Apply the policy to the removed target command.
    ///
    /// Returns the rescheduled command for `ExecuteLater`, `None` for `Cancel`.
    pub fn apply<P: CommandPayload>(&self, command: Command<P>) -> Option<Command<P>> {
        match self.action {
            TimeoutAction::ExecuteLater => Some(command.rescheduled(self.reschedule_step)),
            TimeoutAction::Cancel => None,
        }
    }

    /// Deterministic hash of the record, for log integrity checks.
    pub fn content_hash(&self) -> u64 {
        Fnv1a::new()
            .u64(self.target_step.0)
            .u64(self.target_key.0)
            .byte(self.action.tag())
            .u64(self.reschedule_step.0)
            .finish()
    }
}
