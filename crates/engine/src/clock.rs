//! Process-wide monotonic clock shared by the front-end controller and the
//! back-end voice scheduler so `PlaybackLatency` compares two readings of
//! the same clock domain even though the two sides never share memory
//! other than the bridge.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since the first call to any clock function in this
/// process. Monotonic; never goes backwards.
pub fn now_ms() -> f64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_secs_f64() * 1000.0
}
