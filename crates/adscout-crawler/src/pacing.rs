//! Politeness delays between page fetches.

use rand::Rng;
use std::time::Duration;

/// Jitter a base delay to a uniformly random value between 0.5x and
/// 1.5x of it.
#[must_use]
pub fn jittered(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let factor = rand::thread_rng().gen_range(0.5..=1.5);
    base.mul_f64(factor)
}

/// Sleep for a jittered politeness delay.
pub async fn pause(base: Duration) {
    let delay = jittered(base);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
