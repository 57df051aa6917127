//! Timers owned by the client task: periodic reconnect and one-shot
//! auto-disconnect.

use std::future::pending;
use std::pin::Pin;
use std::sync::Weak;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use crate::error::StompError;
use crate::frame::Headers;
use crate::observer::SessionObserver;
use crate::session::Session;
use crate::transport::{OpenRequest, Transport};

/// Periodic liveness check that re-opens a dropped session.
///
/// Every tick, if the session is not connected (or connecting), the open
/// sequence is issued again with the stored request, observer and
/// connection headers. There is no backoff: a broker that keeps rejecting
/// the session sees one attempt per interval.
pub struct ReconnectSupervisor {
    request: OpenRequest,
    observer: Weak<dyn SessionObserver>,
    headers: Headers,
    interval: Interval,
}

impl ReconnectSupervisor {
    /// Arm a supervisor whose first check happens one `period` from now.
    ///
    /// Fails with [`StompError::InvalidInterval`] when `period` is zero.
    pub fn new(
        request: OpenRequest,
        observer: Weak<dyn SessionObserver>,
        headers: Headers,
        period: Duration,
    ) -> Result<Self, StompError> {
        if period.is_zero() {
            return Err(StompError::InvalidInterval("reconnect interval"));
        }
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            request,
            observer,
            headers,
            interval,
        })
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next check.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Re-open `session` if it is down. Returns whether an attempt was made.
    pub fn check<T: Transport>(&self, session: &mut Session<T>) -> bool {
        if session.is_connected() {
            return false;
        }
        let headers = if self.headers.is_empty() {
            None
        } else {
            Some(self.headers.clone())
        };
        tracing::debug!(url = %self.request.url, "session down, reconnecting");
        session.open(&self.request, self.observer.clone(), headers);
        true
    }
}

/// Wait for the supervisor's next tick, or forever when none is armed.
pub async fn next_reconnect(supervisor: &mut Option<ReconnectSupervisor>) {
    match supervisor {
        Some(s) => s.tick().await,
        None => pending::<()>().await,
    }
}

/// Pending auto-disconnect deadline.
pub type AutoDisconnect = Pin<Box<Sleep>>;

pub fn auto_disconnect_after(delay: Duration) -> AutoDisconnect {
    Box::pin(tokio::time::sleep(delay))
}

/// Wait for the auto-disconnect deadline, or forever when none is armed.
pub async fn next_auto_disconnect(deadline: &mut Option<AutoDisconnect>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ChannelObserver;
    use crate::transport::{ConnectionId, TransportEvent};
    use std::sync::Arc;

    #[derive(Default)]
    struct Opens(Vec<OpenRequest>);

    impl Transport for Opens {
        fn open(&mut self, request: &OpenRequest) -> ConnectionId {
            self.0.push(request.clone());
            self.0.len() as ConnectionId
        }
        fn close(&mut self) {}
        fn send_text(&mut self, _text: String) {}
    }

    #[tokio::test(start_paused = true)]
    async fn check_only_reopens_when_down() {
        let (observer, _events) = ChannelObserver::new();
        let observer = Arc::new(observer);
        let weak = Arc::downgrade(&observer) as Weak<dyn SessionObserver>;
        let request = OpenRequest::new("ws://broker/ws");
        let supervisor =
            ReconnectSupervisor::new(request.clone(), weak, Vec::new(), Duration::from_secs(5))
                .unwrap();
        let mut session = Session::new(Opens::default());

        assert!(supervisor.check(&mut session));
        assert!(session.is_connected());
        assert!(!supervisor.check(&mut session));

        session.handle_event(TransportEvent::Closed {
            code: 1006,
            reason: String::new(),
        });
        assert!(supervisor.check(&mut session));
        assert_eq!(session.transport().0, vec![request.clone(), request]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let (observer, _events) = ChannelObserver::new();
        let observer = Arc::new(observer);
        let mut supervisor = Some(
            ReconnectSupervisor::new(
                OpenRequest::new("ws://broker/ws"),
                Arc::downgrade(&observer) as Weak<dyn SessionObserver>,
                Vec::new(),
                Duration::from_secs(5),
            )
            .unwrap(),
        );
        let start = Instant::now();
        next_reconnect(&mut supervisor).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let (observer, _events) = ChannelObserver::new();
        let observer = Arc::new(observer);
        let result = ReconnectSupervisor::new(
            OpenRequest::new("ws://broker/ws"),
            Arc::downgrade(&observer) as Weak<dyn SessionObserver>,
            Vec::new(),
            Duration::ZERO,
        );
        assert!(matches!(
            result,
            Err(StompError::InvalidInterval("reconnect interval"))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timers_never_fire() {
        let mut none_reconnect: Option<ReconnectSupervisor> = None;
        let mut none_deadline: Option<AutoDisconnect> = None;
        let fired = tokio::time::timeout(Duration::from_secs(60), async {
            tokio::select! {
                _ = next_reconnect(&mut none_reconnect) => true,
                _ = next_auto_disconnect(&mut none_deadline) => true,
            }
        })
        .await;
        assert!(fired.is_err());
    }
}
