//! Periodic keepalive and polling.
//!
//! A single interval task fans one tick out to every live connection per
//! period. Ticks are fire-and-forget: a connection busy enough to have a
//! full mailbox simply skips that tick, and nothing here ever waits on a
//! reply — liveness judgment belongs to the surrounding controller, not to
//! this scheduler.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::gateway::{Command, EventGateway};

/// Periodic echo / stats-poll scheduler.
#[derive(Debug)]
pub struct KeepaliveScheduler {
    gateway: EventGateway,
    period: Duration,
    echo: bool,
    poll_stats: bool,
}

impl KeepaliveScheduler {
    /// Create a scheduler ticking every `period`.
    pub(crate) fn new(
        gateway: EventGateway,
        period: Duration,
        echo: bool,
        poll_stats: bool,
    ) -> Self {
        Self {
            gateway,
            period,
            echo,
            poll_stats,
        }
    }

    /// Run until the owning task is dropped.
    pub(crate) async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            for (id, mailbox) in self.gateway.mailboxes().await {
                let tick = Command::Tick {
                    echo: self.echo,
                    poll_stats: self.poll_stats,
                };
                if mailbox.try_send(tick).is_err() {
                    debug!("connection {id}: keepalive tick skipped");
                }
            }
        }
    }
}
