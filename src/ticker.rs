/// Gate polling loop
/// Re-evaluates the closed-hours gate once per tick and publishes the result

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::countdown::format_duration;
use crate::gate::{ClosedHoursGate, GateSnapshot};
use crate::state::GateMachine;
use crate::status::GateMetrics;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Latest evaluation; `None` until the first tick completes
pub type SnapshotSender = watch::Sender<Option<GateSnapshot>>;
pub type SnapshotReceiver = watch::Receiver<Option<GateSnapshot>>;

pub fn snapshot_channel() -> (SnapshotSender, SnapshotReceiver) {
    watch::channel(None)
}

/// Evaluate the gate once and feed the result to the state machine
pub fn tick<C: Clock + ?Sized>(
    gate: &ClosedHoursGate,
    clock: &C,
    machine: &mut GateMachine,
    metrics: &GateMetrics,
) -> GateSnapshot {
    let snapshot = gate.evaluate(clock.now());

    if let Some(transition) = machine.observe(snapshot.closed) {
        metrics.record_transition();
        match snapshot.remaining {
            Some(remaining) => info!(
                "Gate {} -> {}, next change in {}",
                transition.from.as_str(),
                transition.to.as_str(),
                format_duration(remaining.as_duration())
            ),
            None => info!(
                "Gate {} -> {}, no scheduled change",
                transition.from.as_str(),
                transition.to.as_str()
            ),
        }
    }

    metrics.record_tick(snapshot.closed);
    snapshot
}

/// Run the polling loop until `cancel_token` fires.
///
/// `now` is read fresh from `clock` on every tick. Once cancelled nothing more
/// is published and the sender is dropped, closing the channel for subscribers.
pub async fn run_ticker<C: Clock + ?Sized>(
    gate: &ClosedHoursGate,
    clock: &C,
    tick_interval: Duration,
    metrics: &GateMetrics,
    publisher: SnapshotSender,
    cancel_token: CancellationToken,
) {
    // tokio intervals require a non-zero period
    let tick_interval = if tick_interval.is_zero() {
        warn!("Tick interval of zero requested, using {:?}", DEFAULT_TICK_INTERVAL);
        DEFAULT_TICK_INTERVAL
    } else {
        tick_interval
    };

    match gate.window() {
        Some(window) => info!(
            "Ticker started (closed {:02}:00-{:02}:00 {}, every {:?})",
            window.start_hour(),
            window.end_hour(),
            gate.zone().name(),
            tick_interval
        ),
        None => info!("Ticker started with gate disabled (never closed)"),
    }

    let mut ticks = interval(tick_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut machine = GateMachine::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                break;
            }
            _ = ticks.tick() => {}
        }

        // A tick that raced with teardown is dropped
        if cancel_token.is_cancelled() {
            break;
        }

        let snapshot = tick(gate, clock, &mut machine, metrics);
        if let Some(remaining) = snapshot.remaining {
            debug!("closed={} remaining={}", snapshot.closed, remaining);
        }
        publisher.send_replace(Some(snapshot));
    }

    info!("Ticker stopped");
}
