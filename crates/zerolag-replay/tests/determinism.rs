//! Record a match, then replay it and verify every checkpoint.
//!
//! Each test drives a linear engine while a [`ReplayWriter`] records what
//! arrived at each step together with periodic model hashes, then reads
//! the bytes back and re-simulates them from step 0.

use zerolag_core::{Command, Fix64, Model, PlayerId, Priority, StepId, TimeoutCommand};
use zerolag_engine::{LinearEngine, NetworkCommandLog};
use zerolag_replay::{
    compare_logs, replay_and_compare, replay_match, Checkpoint, ReplayError, ReplayHeader,
    ReplayReader, ReplayWriter, StepMode,
};
use zerolag_test_utils::{random_arrivals, random_commands, CounterSettings, Nudge};

const STEPS: u64 = 64;
const DELAY: u64 = 4;
const CHECKPOINT_EVERY: u64 = 8;

fn dt() -> Fix64 {
    CounterSettings::default().fixed_dt
}

// ── Helpers ─────────────────────────────────────────────────────

/// Run an input-delayed server for `STEPS` steps, feeding it commands as
/// they arrive and recording every step.
fn record_server_match(seed: u64) -> Vec<u8> {
    let settings = CounterSettings::default();
    let commands = random_commands(seed, 3, 40, 30);
    let arrivals = random_arrivals(seed + 1, &commands, DELAY);

    let mut server = LinearEngine::server(settings.clone(), DELAY).unwrap();
    let header = ReplayHeader::for_settings(&settings, StepMode::Fixed);
    let mut buf = Vec::new();
    let mut writer = ReplayWriter::new(&mut buf, header).unwrap();

    let mut next = arrivals.iter().peekable();
    for present in 0..STEPS {
        let mut received = Vec::new();
        while let Some(arrival) = next.next_if(|a| a.received_at.0 == present) {
            server.receive_command(arrival.command.clone());
            received.push(arrival.command.clone());
        }
        server.advance_present_time(dt());

        let view = server.view_model();
        let checkpoint = (present >= DELAY && present % CHECKPOINT_EVERY == 0).then(|| Checkpoint {
            step: view.step(),
            state_hash: view.state_hash(),
        });
        writer.record_step(dt(), &received, &[], checkpoint).unwrap();
    }
    assert!(next.peek().is_none(), "arrivals past the recorded steps");
    writer.flush().unwrap();
    drop(writer);
    buf
}

// ── Fixed-rate matches ──────────────────────────────────────────

#[test]
fn recorded_server_match_replays_exactly() {
    for seed in [1, 17, 40] {
        let bytes = record_server_match(seed);
        let reader = ReplayReader::open(bytes.as_slice()).unwrap();
        let summary = replay_and_compare(reader, CounterSettings::default()).unwrap();

        assert_eq!(summary.steps_replayed, STEPS - 1, "seed {seed}");
        assert_eq!(summary.checkpoints_verified, 7, "seed {seed}");
        assert_eq!(summary.checkpoints_skipped, 0, "seed {seed}");
    }
}

#[test]
fn replaying_twice_gives_the_same_summary() {
    let bytes = record_server_match(5);
    let read = || {
        ReplayReader::open(bytes.as_slice())
            .unwrap()
            .read_match::<Nudge>()
            .unwrap()
    };
    let a = replay_match(CounterSettings::default(), &read()).unwrap();
    let b = replay_match(CounterSettings::default(), &read()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn tampered_checkpoint_is_reported() {
    let bytes = record_server_match(3);
    let mut recorded = ReplayReader::open(bytes.as_slice())
        .unwrap()
        .read_match::<Nudge>()
        .unwrap();
    let target = recorded.checkpoints[2].step;
    recorded.checkpoints[2].state_hash ^= 1;

    let err = replay_match(CounterSettings::default(), &recorded).unwrap_err();
    assert!(
        matches!(err, ReplayError::StateMismatch { step, .. } if step == target),
        "unexpected error: {err}"
    );
}

#[test]
fn different_settings_are_rejected() {
    let bytes = record_server_match(3);
    let reader = ReplayReader::open(bytes.as_slice()).unwrap();
    let err = replay_and_compare(reader, CounterSettings::default().with_seed(9)).unwrap_err();
    assert!(matches!(err, ReplayError::SettingsMismatch { .. }));
}

#[test]
fn checkpoints_past_the_recording_are_skipped() {
    let bytes = record_server_match(8);
    let mut recorded = ReplayReader::open(bytes.as_slice())
        .unwrap()
        .read_match::<Nudge>()
        .unwrap();
    recorded.checkpoints.push(Checkpoint {
        step: StepId(STEPS + 10),
        state_hash: 0,
    });
    let summary = replay_match(CounterSettings::default(), &recorded).unwrap();
    assert_eq!(summary.checkpoints_skipped, 1);
}

// ── Variable-rate matches ───────────────────────────────────────

#[test]
fn single_player_variable_steps_replay_exactly() {
    let settings = CounterSettings::default();
    let mut engine = LinearEngine::single_player(settings.clone()).unwrap();
    let header = ReplayHeader::for_settings(&settings, StepMode::Variable);
    let mut buf = Vec::new();
    let mut writer = ReplayWriter::new(&mut buf, header).unwrap();

    for present in 0..24u64 {
        let duration = if present % 2 == 0 { dt() } else { dt() * Fix64::from_num(2) };
        let mut received = Vec::new();
        if present % 3 == 0 {
            let amount = i32::try_from(present).unwrap() - 10;
            let command = Command::new(PlayerId(0), StepId(present), Priority::MIN, Nudge::new(amount));
            engine.receive_command(command.clone());
            received.push(command);
        }
        engine.advance_present_time(duration);

        let view = engine.view_model();
        let checkpoint = Some(Checkpoint {
            step: view.step(),
            state_hash: view.state_hash(),
        });
        writer.record_step(duration, &received, &[], checkpoint).unwrap();
    }
    drop(writer);

    let recorded = ReplayReader::open(buf.as_slice())
        .unwrap()
        .read_match::<Nudge>()
        .unwrap();
    assert_eq!(recorded.header.mode, StepMode::Variable);
    assert_eq!(
        recorded.log.timing().step_duration(StepId(1)),
        Some(dt() * Fix64::from_num(2))
    );

    let summary = replay_match(settings, &recorded).unwrap();
    assert_eq!(summary.checkpoints_verified, 24);
    assert_eq!(summary.final_state_hash, engine.view_model().state_hash());
}

// ── Network logs ────────────────────────────────────────────────

#[test]
fn network_log_round_trip_keeps_the_finalized_log() {
    let commands = random_commands(31, 2, 20, 16);
    let arrivals = random_arrivals(32, &commands, 3);

    let mut log = NetworkCommandLog::fixed(dt());
    log.extend_to(30);
    for arrival in &arrivals {
        log.receive_command(arrival.received_at, arrival.command.clone());
    }
    let cancelled = &arrivals[0];
    log.receive_timeout(
        cancelled.received_at.after(2),
        TimeoutCommand::for_command(&cancelled.command, cancelled.received_at),
    );

    let header = ReplayHeader::for_settings(&CounterSettings::default(), StepMode::Fixed);
    let mut buf = Vec::new();
    let mut writer = ReplayWriter::new(&mut buf, header).unwrap();
    writer.write_network_log(&log).unwrap();
    assert_eq!(writer.frames_written(), 30);
    assert!(writer.write_network_log(&log).is_err());
    drop(writer);

    let recorded = ReplayReader::open(buf.as_slice())
        .unwrap()
        .read_match::<Nudge>()
        .unwrap();
    assert_eq!(recorded.log.command_count(), log.command_count());
    assert_eq!(recorded.log.timeout_count(), 1);
    assert_eq!(
        compare_logs(&log.flatten_to_log(), &recorded.log.flatten_to_log()),
        None
    );
}

#[test]
fn network_log_receipts_past_the_logged_steps_are_kept() {
    let mut log = NetworkCommandLog::fixed(dt());
    log.extend_to(3);
    let early = Command::new(PlayerId(0), StepId(1), Priority::MIN, Nudge::new(2));
    let late = Command::new(PlayerId(1), StepId(4), Priority::MIN, Nudge::new(5));
    log.receive_command(StepId(1), early);
    log.receive_command(StepId(5), late.clone());
    log.receive_timeout(StepId(6), TimeoutCommand::for_command(&late, StepId(5)));

    let header = ReplayHeader::for_settings(&CounterSettings::default(), StepMode::Fixed);
    let mut buf = Vec::new();
    let mut writer = ReplayWriter::new(&mut buf, header).unwrap();
    writer.write_network_log(&log).unwrap();
    assert_eq!(writer.frames_written(), 7);
    drop(writer);

    let recorded = ReplayReader::open(buf.as_slice())
        .unwrap()
        .read_match::<Nudge>()
        .unwrap();
    assert_eq!(recorded.log.command_count(), 2);
    assert_eq!(recorded.log.timeout_count(), 1);
    assert_eq!(recorded.log.commands_received_at(StepId(5)), &[late][..]);
}
