//! Digests of finalized command logs.
//!
//! Two peers holding logs with equal digests executed the same commands
//! in the same order. Not cryptographically secure.

use zerolag_core::hash::Fnv1a;
use zerolag_core::{CommandPayload, StepId};
use zerolag_engine::CommandLog;

/// Hash every command at steps `0..=through` by step and order key, in
/// execution order.
///
/// Steps without commands contribute nothing, so the digest of an empty
/// log is the FNV-1a offset basis.
pub fn log_hash<P: CommandPayload>(log: &CommandLog<P>, through: StepId) -> u64 {
    log.steps()
        .take_while(|(step, _)| *step <= through)
        .fold(Fnv1a::new(), |hash, (step, commands)| {
            commands
                .iter()
                .fold(hash.u64(step.0).u64(commands.len() as u64), |h, c| {
                    h.u64(c.order_key().0)
                })
        })
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerolag_core::hash::FNV_OFFSET;
    use zerolag_core::{Command, Fix64, PlayerId, Priority};
    use zerolag_test_utils::Nudge;

    fn log_of(commands: &[Command<Nudge>]) -> CommandLog<Nudge> {
        let mut log = CommandLog::fixed(Fix64::from_num(0.0625));
        for command in commands {
            log.receive_command(command.clone());
        }
        log
    }

    fn nudge(step: u64, amount: i32) -> Command<Nudge> {
        Command::new(PlayerId(1), StepId(step), Priority::MIN, Nudge::new(amount))
    }

    #[test]
    fn empty_log_hash_is_fnv_offset() {
        assert_eq!(log_hash(&log_of(&[]), StepId(100)), FNV_OFFSET);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let a = log_of(&[nudge(1, 1), nudge(1, 2), nudge(4, 3)]);
        let b = log_of(&[nudge(4, 3), nudge(1, 2), nudge(1, 1)]);
        assert_eq!(log_hash(&a, StepId(10)), log_hash(&b, StepId(10)));
    }

    #[test]
    fn moved_command_changes_hash() {
        let a = log_of(&[nudge(1, 1), nudge(2, 2)]);
        let b = log_of(&[nudge(1, 1), nudge(3, 2)]);
        assert_ne!(log_hash(&a, StepId(10)), log_hash(&b, StepId(10)));
    }

    #[test]
    fn later_steps_are_excluded() {
        let a = log_of(&[nudge(1, 1)]);
        let b = log_of(&[nudge(1, 1), nudge(7, 5)]);
        assert_eq!(log_hash(&a, StepId(6)), log_hash(&b, StepId(6)));
        assert_ne!(log_hash(&a, StepId(7)), log_hash(&b, StepId(7)));
    }
}
