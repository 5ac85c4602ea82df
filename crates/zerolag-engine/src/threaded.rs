//! Resimulating engine on a dedicated computation thread.
//!
//! # Architecture
//!
//! ```text
//! Driving thread                          Computation thread
//!     |                                         |
//!     |--receive_command()--->[inbound]-------->| drain inbound
//!     |--receive_timeout()--->[inbound]-------->|   into log / resolver
//!     |                                         | resolve timeouts
//!     |--advance_present_time()                 | extend log to present
//!     |    present_time += dt ->[present cell]->| wave steps if behind,
//!     |    updates += 1 ------->[update count]->|   within the step cap
//!     |    take_newer(&mut displayed) <-[handoff]<- publish at wave end
//!     |    displayed.update(dt)                 | else park(idle_interval)
//!     |                                         |
//!     |--metrics()----------->[inbound]-------->| reply with a copy
//!     |--stop()---->[stop flag] + unpark ------>| exit loop
//!     |    join                                 |
//! ```
//!
//! The command log, model pool, resolver, and snapshot history live on
//! the computation thread only. The driving thread touches the shared
//! present-time cell and update count, the inbound channel, and the view
//! model handoff.
//!
//! Without a step cap the computation thread runs as fast as it can. With
//! [`debug_set_max_steps_per_update`](ThreadedEngine::debug_set_max_steps_per_update)
//! each call to `advance_present_time` grants that many steps, and a grant
//! the thread does not use before catching up is forfeited.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};
use zerolag_core::time::whole_steps;
use zerolag_core::{Command, Fix64, Model, ModelOf, PayloadOf, Settings, StepId, TimeoutCommand};

use crate::config::{ConfigError, EngineConfig};
use crate::engine::Engine;
use crate::metrics::EngineMetrics;
use crate::observer::{EngineObserver, NoopObserver};
use crate::resim::ResimulatingAdvance;
use crate::view::{HandoffPublisher, ViewModelHandoff};

type ComputeEngine<S> = Engine<S, ResimulatingAdvance<ModelOf<S>, HandoffPublisher<ModelOf<S>>>>;

/// Messages from the driving thread to the computation thread.
enum Inbound<P> {
    Command(Command<P>),
    Timeout(TimeoutCommand),
    Freeze(StepId),
    ClearFreeze,
    MaxStepsPerUpdate(Option<u32>),
    Metrics(Sender<EngineMetrics>),
}

/// State shared by both threads.
struct Shared {
    present_time: Mutex<Fix64>,
    updates: AtomicU64,
    stop: AtomicBool,
    last_actual_step: AtomicU64,
    /// Counters as of the computation thread's exit.
    final_metrics: Mutex<Option<EngineMetrics>>,
}

/// How long [`ThreadedEngine::metrics`] waits for the computation thread.
const METRICS_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Steps the computation thread may still run before its next update.
#[derive(Debug)]
struct StepGrant {
    cap: Option<u32>,
    seen_updates: u64,
    remaining: u64,
}

impl StepGrant {
    fn new(cap: Option<u32>) -> Self {
        Self {
            cap,
            seen_updates: 0,
            remaining: 0,
        }
    }

    fn set_cap(&mut self, cap: Option<u32>) {
        self.cap = cap;
        self.remaining = 0;
    }

    /// Add the grant for every update since the last call.
    fn observe_updates(&mut self, updates: u64) {
        let new = updates.saturating_sub(self.seen_updates);
        self.seen_updates = updates;
        if let Some(cap) = self.cap {
            self.remaining = self
                .remaining
                .saturating_add(new.saturating_mul(u64::from(cap)));
        }
    }

    fn allows_step(&self) -> bool {
        self.cap.is_none() || self.remaining > 0
    }

    fn spend(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn forfeit(&mut self) {
        self.remaining = 0;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A resimulating engine whose simulation runs on its own thread.
///
/// All methods are called from the driving thread. The view model is
/// owned by the driving thread and swapped with newer published models
/// during [`advance_present_time`](ThreadedEngine::advance_present_time).
/// Dropping the engine stops and joins the computation thread.
pub struct ThreadedEngine<S: Settings> {
    settings: Arc<S>,
    config: EngineConfig,
    shared: Arc<Shared>,
    handoff: Arc<ViewModelHandoff<ModelOf<S>>>,
    inbound: Sender<Inbound<PayloadOf<S>>>,
    displayed: ModelOf<S>,
    max_input_step: Option<StepId>,
    max_present_step: Option<StepId>,
    compute_thread: Option<JoinHandle<()>>,
}

impl<S: Settings> ThreadedEngine<S> {
    /// Start an engine with history sized from `settings`.
    pub fn new(settings: S) -> Result<Self, ConfigError> {
        let config = EngineConfig::for_settings(&settings);
        Self::with_config(settings, config)
    }

    /// Start an engine with explicit configuration.
    pub fn with_config(settings: S, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_observer(settings, config, NoopObserver)
    }

    /// Start an engine whose computation thread reports to `observer`.
    pub fn with_observer(
        settings: S,
        config: EngineConfig,
        observer: impl EngineObserver<ModelOf<S>> + 'static,
    ) -> Result<Self, ConfigError> {
        let settings = Arc::new(settings);
        let mut displayed = settings.create_zero_model(true);
        displayed.enliven();
        let handoff = Arc::new(ViewModelHandoff::new(displayed.step()));

        let engine = ComputeEngine::<S>::with_publisher(
            Arc::clone(&settings),
            config.clone(),
            HandoffPublisher::new(Arc::clone(&handoff)),
        )?
        .with_observer(observer);

        let shared = Arc::new(Shared {
            present_time: Mutex::new(Fix64::ZERO),
            updates: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            last_actual_step: AtomicU64::new(0),
            final_metrics: Mutex::new(None),
        });
        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();

        let thread_shared = Arc::clone(&shared);
        let idle = config.idle_interval;
        let grant = StepGrant::new(config.max_steps_per_update);
        let compute_thread = thread::Builder::new()
            .name("zerolag-compute".into())
            .spawn(move || run_computation(engine, thread_shared, inbound_rx, idle, grant))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            settings,
            config,
            shared,
            handoff,
            inbound: inbound_tx,
            displayed,
            max_input_step: None,
            max_present_step: None,
            compute_thread: Some(compute_thread),
        })
    }

    /// Queue a command for the computation thread.
    pub fn receive_command(&self, command: Command<PayloadOf<S>>) {
        if self.is_stopped() {
            return;
        }
        let _ = self.inbound.send(Inbound::Command(command));
    }

    /// Queue a timeout for the computation thread.
    pub fn receive_timeout(&self, timeout: TimeoutCommand) {
        if self.is_stopped() {
            return;
        }
        let _ = self.inbound.send(Inbound::Timeout(timeout));
    }

    /// Move present time forward, pick up a newer published model, and
    /// free-run the view model.
    pub fn advance_present_time(&mut self, dt: Fix64) {
        if self.is_stopped() {
            return;
        }
        {
            let mut present = lock(&self.shared.present_time);
            *present = present.saturating_add(dt);
        }
        self.shared.updates.fetch_add(1, Ordering::AcqRel);
        self.wake_computation();
        if self.handoff.take_newer(&mut self.displayed) {
            debug!(step = self.displayed.step().0, "view model swapped in");
        }
        if self.max_present_step.is_none() {
            self.displayed.update(dt, &[]);
        }
    }

    /// The model the driving thread displays. Its step never decreases.
    pub fn view_model(&self) -> &ModelOf<S> {
        &self.displayed
    }

    /// Stop the computation thread and wait for it to exit.
    ///
    /// The thread finishes at most the step it is running. Terminal.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.compute_thread.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("computation thread panicked before stop");
            }
        }
    }

    fn wake_computation(&self) {
        if let Some(handle) = &self.compute_thread {
            handle.thread().unpark();
        }
    }

    /// Whether [`stop`](ThreadedEngine::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    /// Duration of any step. Threaded engines always run at the fixed rate.
    pub fn get_step_duration(&self, _step: StepId) -> Option<Fix64> {
        Some(self.settings.fixed_dt())
    }

    /// Accumulated present time.
    pub fn present_time(&self) -> Fix64 {
        *lock(&self.shared.present_time)
    }

    /// The step matching present time, limited by any debug freeze.
    pub fn present_step(&self) -> StepId {
        let step = StepId(whole_steps(self.present_time(), self.settings.fixed_dt()));
        match self.max_present_step {
            Some(max) => step.min(max),
            None => step,
        }
    }

    /// Earliest possibly stale step, as last reported by the
    /// computation thread.
    pub fn last_actual_step(&self) -> StepId {
        StepId(self.shared.last_actual_step.load(Ordering::Acquire))
    }

    /// Snapshot of the computation thread's counters.
    ///
    /// Asks the computation thread for a copy and waits for the reply.
    /// After stop, returns the counters the thread held when it exited.
    pub fn metrics(&self) -> EngineMetrics {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if !self.is_stopped() && self.inbound.send(Inbound::Metrics(reply_tx)).is_ok() {
            self.wake_computation();
            match reply_rx.recv_timeout(METRICS_REPLY_TIMEOUT) {
                Ok(metrics) => return metrics,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("computation thread did not answer a metrics request");
                }
                Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        lock(&self.shared.final_metrics).clone().unwrap_or_default()
    }

    /// The match settings.
    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Freeze input at `max_input_step`. See [`Engine::debug_set_freeze`].
    pub fn debug_set_freeze(&mut self, max_input_step: StepId) {
        let catch_up = self.config.catch_up_steps(self.settings.max_lag_in_steps());
        self.max_input_step = Some(max_input_step);
        self.max_present_step = Some(max_input_step.after(catch_up));
        let _ = self.inbound.send(Inbound::Freeze(max_input_step));
    }

    /// Lift a debug freeze. See [`Engine::debug_clear_freeze`].
    pub fn debug_clear_freeze(&mut self) {
        self.max_input_step = None;
        self.max_present_step = None;
        let _ = self.inbound.send(Inbound::ClearFreeze);
    }

    /// Whether a debug freeze is active.
    pub fn is_frozen(&self) -> bool {
        self.max_present_step.is_some()
    }

    /// Debug input horizon, if frozen.
    pub fn max_input_step(&self) -> Option<StepId> {
        self.max_input_step
    }

    /// Limit how many steps the computation thread runs per
    /// [`advance_present_time`](ThreadedEngine::advance_present_time) call.
    /// `None` lifts the limit.
    pub fn debug_set_max_steps_per_update(&mut self, steps: Option<u32>) {
        self.config.max_steps_per_update = steps;
        let _ = self.inbound.send(Inbound::MaxStepsPerUpdate(steps));
    }
}

impl<S: Settings> Drop for ThreadedEngine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S: Settings> fmt::Debug for ThreadedEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedEngine")
            .field("present_step", &self.present_step())
            .field("displayed_step", &self.displayed.step())
            .field("last_actual_step", &self.last_actual_step())
            .field("handoff", &self.handoff)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Computation loop body.
///
/// Checks the stop flag at the top of every iteration; each iteration
/// does at most one step of work.
fn run_computation<S: Settings>(
    mut engine: ComputeEngine<S>,
    shared: Arc<Shared>,
    inbound: Receiver<Inbound<PayloadOf<S>>>,
    idle: Duration,
    mut grant: StepGrant,
) {
    info!("computation thread started");
    while !shared.stop.load(Ordering::Acquire) {
        for message in inbound.try_iter() {
            match message {
                Inbound::Command(command) => engine.receive_command(command),
                Inbound::Timeout(timeout) => engine.receive_timeout(timeout),
                Inbound::Freeze(step) => engine.debug_set_freeze(step),
                Inbound::ClearFreeze => engine.debug_clear_freeze(),
                Inbound::MaxStepsPerUpdate(steps) => {
                    engine.debug_set_max_steps_per_update(steps);
                    grant.set_cap(steps);
                }
                Inbound::Metrics(reply) => {
                    let _ = reply.send(engine.metrics().clone());
                }
            }
        }

        // Updates are counted after present time is written.
        grant.observe_updates(shared.updates.load(Ordering::Acquire));
        let present_time = *lock(&shared.present_time);
        engine.set_present_time(present_time);
        let present = engine.sync_to_present();
        let stepped = grant.allows_step() && engine.step_toward(present);
        if stepped {
            grant.spend();
        } else if engine.core().cursor_step() >= present {
            grant.forfeit();
        }

        shared
            .last_actual_step
            .store(engine.last_actual_step().0, Ordering::Release);

        if !stepped {
            thread::park_timeout(idle);
        }
    }
    engine.stop();
    *lock(&shared.final_metrics) = Some(engine.metrics().clone());
    info!(
        steps = engine.metrics().steps_simulated,
        waves = engine.metrics().waves_completed,
        "computation thread exited"
    );
}
