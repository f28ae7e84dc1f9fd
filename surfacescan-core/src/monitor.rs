use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, Span, debug, info, warn};

use surfacescan_config::MonitorConfig;

use crate::gateway::Gateway;

/// What the periodic probe noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    Restored,
    Lost,
    /// Auto-refresh period elapsed; the host should reload its dashboard.
    RefreshDue,
}

/// Background `/health` probe. Stops when dropped.
#[derive(Debug)]
pub struct HealthMonitor {
    task: JoinHandle<()>,
    refresh: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    pub fn spawn(
        gateway: Gateway,
        config: &MonitorConfig,
        span: Span,
    ) -> (Self, mpsc::UnboundedReceiver<HealthEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let period = config.health_interval;
        let probe_tx = tx.clone();
        let task = tokio::spawn(
            async move {
                let mut ticks = interval_at(Instant::now() + period, period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticks.tick().await;
                    let was_connected = gateway.connection_state().is_connected();
                    let connected = gateway.test_connection().await;
                    let event = match (was_connected, connected) {
                        (false, true) => {
                            info!("API connection restored");
                            HealthEvent::Restored
                        }
                        (true, false) => {
                            warn!("API connection lost");
                            HealthEvent::Lost
                        }
                        _ => {
                            debug!(connected, "health probe");
                            continue;
                        }
                    };
                    if probe_tx.send(event).is_err() {
                        break;
                    }
                }
            }
            .instrument(span.clone()),
        );

        let refresh = config.dashboard_refresh.map(|period| {
            tokio::spawn(
                async move {
                    let mut ticks = interval_at(Instant::now() + period, period);
                    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticks.tick().await;
                        if tx.send(HealthEvent::RefreshDue).is_err() {
                            break;
                        }
                    }
                }
                .instrument(span),
            )
        });

        (Self { task, refresh }, rx)
    }

    pub fn stop(&self) {
        self.task.abort();
        if let Some(refresh) = &self.refresh {
            refresh.abort();
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
