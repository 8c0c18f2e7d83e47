use std::time::Duration;

/// The delays between `attempts` attempts: none after the first failure, then `unit`, `4 * unit`, `9 * unit`...
pub fn quadratic_backoff(unit: Duration, attempts: usize) -> impl Iterator<Item = Duration> {
    let retries = u32::try_from(attempts.saturating_sub(1)).unwrap_or(u32::MAX);
    (0..retries).map(move |i| unit.saturating_mul(i.saturating_mul(i)))
}
