//! Async driver for [`TimerEngine`].
//!
//! One tokio task owns the engine. Commands arrive over an unbounded
//! channel, a 1 s interval drives `tick()` while Running, and every event
//! is forwarded to [`SessionSync`] and a broadcast channel. Completion fires
//! the configured notification channels on a separate task so a slow or
//! failing device never stalls the countdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};

use super::engine::{TimerEngine, TimerState, TimerStatus, DEFAULT_SYNC_EVERY_SECS};
use crate::channel::ChannelKind;
use crate::events::Event;
use crate::manager::NotificationManager;
use crate::pattern::PresetName;
use crate::session::{SessionStore, SessionSync};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct TimerSettings {
    /// Channels fired on completion, in order.
    pub channels: Vec<ChannelKind>,
    pub preset: PresetName,
    pub tick: Duration,
    pub sync_every_secs: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            channels: vec![ChannelKind::Visual],
            preset: PresetName::Medium,
            tick: Duration::from_secs(1),
            sync_every_secs: DEFAULT_SYNC_EVERY_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Start(u32),
    Pause,
    Resume,
    Reset,
    Cancel,
    Rearm,
    Silence,
    Shutdown,
}

/// Handle to a running timer task.
pub struct TimerService {
    control: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<TimerStatus>,
    events: broadcast::Sender<Event>,
    task: JoinHandle<()>,
}

impl TimerService {
    pub fn spawn(
        manager: Arc<NotificationManager>,
        store: Arc<dyn SessionStore>,
        settings: TimerSettings,
    ) -> Self {
        let engine = TimerEngine::with_sync_interval(settings.sync_every_secs);
        let (control, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(engine.status());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let runner = Runner {
            engine,
            manager,
            sessions: SessionSync::spawn(store),
            settings,
            status: status_tx,
            events: events.clone(),
            alerts: JoinSet::new(),
        };
        let task = tokio::spawn(runner.run(control_rx));

        Self {
            control,
            status,
            events,
            task,
        }
    }

    pub fn start(&self, scheduled_secs: u32) {
        self.send(Control::Start(scheduled_secs));
    }

    pub fn pause(&self) {
        self.send(Control::Pause);
    }

    pub fn resume(&self) {
        self.send(Control::Resume);
    }

    pub fn reset(&self) {
        self.send(Control::Reset);
    }

    pub fn cancel(&self) {
        self.send(Control::Cancel);
    }

    pub fn rearm(&self) {
        self.send(Control::Rearm);
    }

    /// Stop any notification that is still playing.
    pub fn silence(&self) {
        self.send(Control::Silence);
    }

    /// Latest published engine status.
    pub fn status(&self) -> TimerStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<TimerStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Wait until the published status satisfies `pred`.
    ///
    /// Returns the last known status if the service stops first.
    pub async fn wait_for(&self, pred: impl FnMut(&TimerStatus) -> bool) -> TimerStatus {
        let mut rx = self.status.clone();
        let result = rx.wait_for(pred).await.map(|status| *status);
        result.unwrap_or_else(|_| *rx.borrow())
    }

    /// Stop the task after in-flight notifications and session writes finish.
    pub async fn shutdown(self) {
        self.send(Control::Shutdown);
        if let Err(err) = self.task.await {
            warn!(error = %err, "timer task panicked");
        }
    }

    fn send(&self, command: Control) {
        if self.control.send(command).is_err() {
            warn!(?command, "timer task is gone; command dropped");
        }
    }
}

struct Runner {
    engine: TimerEngine,
    manager: Arc<NotificationManager>,
    sessions: SessionSync,
    settings: TimerSettings,
    status: watch::Sender<TimerStatus>,
    events: broadcast::Sender<Event>,
    alerts: JoinSet<()>,
}

impl Runner {
    async fn run(mut self, mut control: mpsc::UnboundedReceiver<Control>) {
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                command = control.recv() => {
                    match command {
                        None | Some(Control::Shutdown) => break,
                        Some(Control::Silence) => self.manager.stop_all().await,
                        Some(command) => {
                            if let Some(event) = self.apply(command) {
                                self.dispatch(event);
                            } else {
                                debug!(?command, state = ?self.engine.state(), "command ignored");
                            }
                        }
                    }
                }
                _ = next_tick(&mut ticker) => {
                    if let Some(event) = self.engine.tick() {
                        self.dispatch(event);
                    } else {
                        self.publish();
                    }
                }
                Some(joined) = self.alerts.join_next(), if !self.alerts.is_empty() => {
                    if let Err(err) = joined {
                        warn!(error = %err, "notification task failed");
                    }
                }
            }

            // A fresh interval on every start/resume so a partial second
            // before a pause is never counted.
            let running = self.engine.state() == TimerState::Running;
            if running && ticker.is_none() {
                let period = self.settings.tick;
                ticker = Some(interval_at(Instant::now() + period, period));
            } else if !running {
                ticker = None;
            }
        }

        while let Some(joined) = self.alerts.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "notification task failed");
            }
        }
        self.sessions.flush().await;
        debug!("timer task stopped");
    }

    fn apply(&mut self, command: Control) -> Option<Event> {
        match command {
            Control::Start(secs) => self.engine.start(secs),
            Control::Pause => self.engine.pause(),
            Control::Resume => self.engine.resume(),
            Control::Reset => self.engine.reset(),
            Control::Cancel => self.engine.cancel(),
            Control::Rearm => self.engine.rearm(),
            Control::Silence | Control::Shutdown => None,
        }
    }

    fn dispatch(&mut self, event: Event) {
        match &event {
            Event::TimerStarted {
                session,
                scheduled_secs,
                ..
            } => info!(session, scheduled_secs, "timer started"),
            Event::TimerCompleted {
                session,
                elapsed_secs,
                ..
            } => {
                info!(session, elapsed_secs, "timer completed");
                self.fire_alerts();
            }
            Event::TimerCancelled {
                session,
                elapsed_secs,
                ..
            } => info!(session, elapsed_secs, "timer cancelled"),
            other => debug!(event = ?other, "timer event"),
        }

        self.sessions.submit(&event);
        // No subscribers is fine.
        let _ = self.events.send(event);
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.engine.status());
    }

    fn fire_alerts(&mut self) {
        if self.settings.channels.is_empty() {
            info!("no notification channels enabled");
            return;
        }
        let manager = Arc::clone(&self.manager);
        let channels = self.settings.channels.clone();
        let preset = self.settings.preset;
        let events = self.events.clone();
        self.alerts.spawn(async move {
            let reports = manager.fire_all(&channels, preset).await;
            let _ = events.send(Event::NotificationsFired {
                preset,
                reports,
                at: Utc::now(),
            });
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
