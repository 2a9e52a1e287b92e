//! Scripted coarse location source for tests and offline simulation.
//!
//! Each [`ScriptedFix`] is delivered `after` the previous one. A background
//! task feeds the subscription channel; unsubscribing cancels it and a later
//! subscribe continues with the fixes not yet delivered.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{CoarseFix, CoarseLocationSource, LocationProvider};
use crate::error::EngineResult;

/// Channel capacity for scripted fixes.
const FIX_CHANNEL_CAPACITY: usize = 32;

/// A fix delivered `after` the previous one (or after subscribing).
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFix {
    pub after: Duration,
    pub fix: CoarseFix,
}

/// Observes subscription activity of a [`ScriptedLocationSource`].
#[derive(Debug, Clone, Default)]
pub struct SubscriptionProbe {
    active: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl SubscriptionProbe {
    /// Whether a subscription is currently live.
    pub fn is_subscribed(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Number of subscribe calls so far.
    pub fn subscribe_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Location source fake driven by a script.
#[derive(Debug)]
pub struct ScriptedLocationSource {
    pending: Arc<Mutex<VecDeque<ScriptedFix>>>,
    last_known: HashMap<LocationProvider, CoarseFix>,
    feeder: Option<CancellationToken>,
    probe: SubscriptionProbe,
}

impl ScriptedLocationSource {
    pub fn new(fixes: impl IntoIterator<Item = ScriptedFix>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(fixes.into_iter().collect())),
            last_known: HashMap::new(),
            feeder: None,
            probe: SubscriptionProbe::default(),
        }
    }

    /// A source that never produces fixes.
    pub fn silent() -> Self {
        Self::new([])
    }

    /// Seed the cached last-known fix for a provider.
    pub fn with_last_known(mut self, fix: CoarseFix) -> Self {
        self.last_known.insert(fix.provider, fix);
        self
    }

    pub fn probe(&self) -> SubscriptionProbe {
        self.probe.clone()
    }

    fn stop_feeder(&mut self) {
        if let Some(token) = self.feeder.take() {
            token.cancel();
            self.probe.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl CoarseLocationSource for ScriptedLocationSource {
    fn subscribe(&mut self, min_interval: Duration) -> EngineResult<mpsc::Receiver<CoarseFix>> {
        self.stop_feeder();

        let (tx, rx) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let pending = Arc::clone(&self.pending);
        let feeder_token = token.clone();

        tokio::spawn(async move {
            loop {
                let Some(after) = pending.lock().front().map(|f| f.after) else {
                    break;
                };

                tokio::select! {
                    biased;
                    _ = feeder_token.cancelled() => break,
                    _ = tokio::time::sleep(after) => {}
                }

                let Some(next) = pending.lock().pop_front() else {
                    break;
                };
                if tx.send(next.fix).await.is_err() {
                    break;
                }
            }
        });

        tracing::debug!(
            min_interval_ms = min_interval.as_millis() as u64,
            "Scripted location subscription started"
        );

        self.feeder = Some(token);
        self.probe.active.fetch_add(1, Ordering::SeqCst);
        self.probe.total.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        self.stop_feeder();
    }

    fn last_known(&self, provider: LocationProvider) -> Option<CoarseFix> {
        self.last_known.get(&provider).cloned()
    }
}

impl Drop for ScriptedLocationSource {
    fn drop(&mut self) {
        self.stop_feeder();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64) -> CoarseFix {
        CoarseFix::new(lat, 10.0, 12.0, LocationProvider::Gps)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_in_order() {
        let mut source = ScriptedLocationSource::new([
            ScriptedFix {
                after: Duration::from_millis(100),
                fix: fix(53.0),
            },
            ScriptedFix {
                after: Duration::from_millis(100),
                fix: fix(53.1),
            },
        ]);
        let mut rx = source.subscribe(Duration::from_secs(1)).unwrap();

        assert_eq!(rx.recv().await.map(|f| f.latitude), Some(53.0));
        assert_eq!(rx.recv().await.map(|f| f.latitude), Some(53.1));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_delivery_and_resubscribe_continues() {
        let mut source = ScriptedLocationSource::new([
            ScriptedFix {
                after: Duration::from_millis(10),
                fix: fix(1.0),
            },
            ScriptedFix {
                after: Duration::from_secs(10),
                fix: fix(2.0),
            },
        ]);
        let probe = source.probe();

        let mut rx = source.subscribe(Duration::from_secs(1)).unwrap();
        assert_eq!(rx.recv().await.map(|f| f.latitude), Some(1.0));
        assert!(probe.is_subscribed());

        source.unsubscribe();
        assert!(!probe.is_subscribed());
        assert_eq!(rx.recv().await, None);

        let mut rx = source.subscribe(Duration::from_secs(1)).unwrap();
        assert_eq!(rx.recv().await.map(|f| f.latitude), Some(2.0));
        assert_eq!(probe.subscribe_count(), 2);
    }

    #[test]
    fn test_last_known() {
        let source = ScriptedLocationSource::silent().with_last_known(fix(48.0));
        assert_eq!(
            source.last_known(LocationProvider::Gps).map(|f| f.latitude),
            Some(48.0)
        );
        assert!(source.last_known(LocationProvider::Network).is_none());
    }
}
