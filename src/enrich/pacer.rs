// src/enrich/pacer.rs
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Gate around every outbound geolocation request: `acquire` before sending,
/// `release` once the request has finished (successfully or not).
#[async_trait]
pub trait Pacer: Send {
    async fn acquire(&mut self);
    fn release(&mut self) {}
}

/// Enforces a minimum quiet gap between the end of one request and the start
/// of the next. The first acquisition never waits.
#[derive(Debug, Clone)]
pub struct FixedDelayPacer {
    delay: Duration,
    last_done: Option<Instant>,
}

impl FixedDelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_done: None,
        }
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn acquire(&mut self) {
        if let Some(done) = self.last_done {
            tokio::time::sleep_until(done + self.delay).await;
        }
    }

    fn release(&mut self) {
        self.last_done = Some(Instant::now());
    }
}

/// No pacing at all (tests, local mirrors without rate limits).
#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

#[async_trait]
impl Pacer for Unpaced {
    async fn acquire(&mut self) {}
}
