//! Content-addressed sample preloader with single-flight loads.
//!
//! The actual fetch (disk/HTTP) is out of scope here -- callers plug in a
//! [`SampleLoader`]. This module only owns the single-flight bookkeeping
//! and the forever-cache-within-process contract, plus the side effect of
//! telling the back-end what resolved via the bridge.

use crate::bridge::{ControlCommand, FrontBridge};
use crate::clock::now_ms;
use crate::error::LoadError;
use crate::sample::{Pcm, PlaybackId, SampleRequest};
use crate::signals::{Signal, SignalBus};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Notify;

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Pcm, LoadError>> + Send>>;

/// Pluggable sample fetcher. The sample library layout and HTTP transport
/// are explicitly out of scope; this is the seam a caller wires them
/// in through.
pub trait SampleLoader: Send + Sync {
    fn load(&self, req: &SampleRequest) -> LoadFuture;
}

#[derive(Default)]
struct PreloaderState {
    /// Requests that have already had their one resolution sent.
    sent: HashSet<SampleRequest>,
    /// Requests currently being loaded; waiters `notified()` on resolution.
    in_flight: HashMap<SampleRequest, Arc<Notify>>,
}

pub struct SamplePreloader {
    state: Mutex<PreloaderState>,
    loader: Arc<dyn SampleLoader>,
}

impl SamplePreloader {
    pub fn new(loader: Arc<dyn SampleLoader>) -> Self {
        Self {
            state: Mutex::new(PreloaderState::default()),
            loader,
        }
    }

    /// Whether `req` has already had its resolution sent (cache-forever
    /// check, used by callers who want to skip re-requesting in lookahead).
    pub fn is_resolved(&self, req: &SampleRequest) -> bool {
        self.state.lock().sent.contains(req)
    }

    /// Ensure every request in `reqs` resolves at least once for
    /// `playback_id`: concurrent calls for the same request await one
    /// in-flight resolution rather than re-fetching (S5/property 6).
    ///
    /// Sends exactly one `Sample.Complete`/`Sample.NotFound` per distinct
    /// request across the process's lifetime, via `bridge`. If `signals`
    /// is provided and new loads actually start, emits the bracketing
    /// `PreloadingSamples`/`SamplesPreloaded` signals; if everything was
    /// already cached, emits nothing.
    pub async fn ensure_loaded(
        &self,
        playback_id: PlaybackId,
        reqs: Vec<SampleRequest>,
        bridge: &Mutex<FrontBridge>,
        signals: Option<&SignalBus>,
    ) {
        let mut to_await: Vec<(SampleRequest, Arc<Notify>)> = Vec::new();
        let mut to_load: Vec<(SampleRequest, Arc<Notify>)> = Vec::new();

        {
            let mut state = self.state.lock();
            let mut seen = HashSet::new();
            for req in reqs {
                if !seen.insert(req.clone()) {
                    continue;
                }
                if state.sent.contains(&req) {
                    continue;
                }
                if let Some(notify) = state.in_flight.get(&req) {
                    to_await.push((req, notify.clone()));
                } else {
                    let notify = Arc::new(Notify::new());
                    state.in_flight.insert(req.clone(), notify.clone());
                    to_load.push((req, notify));
                }
            }
        }

        let new_count = to_load.len();
        if new_count > 0 {
            if let Some(bus) = signals {
                let names = to_load.iter().map(|(r, _)| r.display_name()).collect();
                bus.emit(Signal::PreloadingSamples {
                    playback_id: playback_id.clone(),
                    count: new_count,
                    names,
                });
            }
        }
        let started_at = now_ms();

        let mut set = tokio::task::JoinSet::new();
        for (req, notify) in to_load {
            let loader = self.loader.clone();
            set.spawn(async move {
                let result = loader.load(&req).await;
                (req, result, notify)
            });
        }

        while let Some(joined) = set.join_next().await {
            let Ok((req, result, notify)) = joined else { continue };
            {
                let mut state = self.state.lock();
                state.in_flight.remove(&req);
                state.sent.insert(req.clone());
            }
            let mut locked_bridge = bridge.lock();
            match result {
                Ok(pcm) => locked_bridge.send_control(ControlCommand::SampleComplete {
                    playback_id: playback_id.clone(),
                    note: req.note(),
                    pitch_hz: pcm.pitch_hz,
                    pcm: pcm.samples.clone(),
                    pcm_sample_rate: pcm.sample_rate,
                    req,
                }),
                Err(_) => locked_bridge.send_control(ControlCommand::SampleNotFound {
                    playback_id: playback_id.clone(),
                    req,
                }),
            }
            drop(locked_bridge);
            notify.notify_waiters();
        }

        for (req, notify) in to_await {
            loop {
                let fut = notify.notified();
                if self.state.lock().sent.contains(&req) {
                    break;
                }
                fut.await;
            }
        }

        if new_count > 0 {
            if let Some(bus) = signals {
                bus.emit(Signal::SamplesPreloaded {
                    playback_id,
                    count: new_count,
                    duration_ms: now_ms() - started_at,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl SampleLoader for CountingLoader {
        fn load(&self, req: &SampleRequest) -> LoadFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let req = req.clone();
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                if req.sound.as_deref() == Some("missing") {
                    Err(LoadError::NotFound(req.display_name()))
                } else {
                    Ok(Pcm {
                        samples: Arc::from(vec![0.0f32; 16]),
                        sample_rate: 44100,
                        pitch_hz: 440.0,
                    })
                }
            })
        }
    }

    #[tokio::test]
    async fn test_single_flight_dedupes_concurrent_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(CountingLoader { calls: calls.clone() });
        let preloader = Arc::new(SamplePreloader::new(loader));
        let (front, _back) = crate::bridge::channel();
        let bridge = Arc::new(Mutex::new(front));

        let req_bd = SampleRequest::new(None, Some("bd".into()), None, None);
        let req_sd = SampleRequest::new(None, Some("sd".into()), None, None);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let preloader = preloader.clone();
            let bridge = bridge.clone();
            let reqs = vec![req_bd.clone(), req_sd.clone()];
            handles.push(tokio::spawn(async move {
                preloader.ensure_loaded("p1".into(), reqs, &bridge, None).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(preloader.is_resolved(&req_bd));
        assert!(preloader.is_resolved(&req_sd));
    }

    #[tokio::test]
    async fn test_not_found_is_cached_and_never_blocks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(CountingLoader { calls: calls.clone() });
        let preloader = SamplePreloader::new(loader);
        let (front, _back) = crate::bridge::channel();
        let bridge = Mutex::new(front);

        let req = SampleRequest::new(None, Some("missing".into()), None, None);
        preloader.ensure_loaded("p1".into(), vec![req.clone()], &bridge, None).await;
        preloader.ensure_loaded("p1".into(), vec![req.clone()], &bridge, None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(preloader.is_resolved(&req));
    }

    #[tokio::test]
    async fn test_signals_emitted_only_for_new_loads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(CountingLoader { calls });
        let preloader = SamplePreloader::new(loader);
        let (front, _back) = crate::bridge::channel();
        let bridge = Mutex::new(front);
        let signals = SignalBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        signals.subscribe(move |s| events2.lock().push(format!("{s:?}")));

        let req = SampleRequest::new(None, Some("bd".into()), None, None);
        preloader.ensure_loaded("p1".into(), vec![req.clone()], &bridge, Some(&signals)).await;
        assert_eq!(events.lock().len(), 2); // PreloadingSamples + SamplesPreloaded

        preloader.ensure_loaded("p1".into(), vec![req], &bridge, Some(&signals)).await;
        assert_eq!(events.lock().len(), 2); // unchanged: nothing new
    }
}
