//! Cache counters recorded through the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder.

use metrics::counter;

pub(crate) fn track_lookup(result: &'static str) {
    counter!("cache_lookups_total", "result" => result).increment(1);
}

pub(crate) fn track_write(result: &'static str) {
    counter!("cache_writes_total", "result" => result).increment(1);
}

pub(crate) fn track_invalidation(result: &'static str) {
    counter!("cache_invalidations_total", "result" => result).increment(1);
}

pub(crate) fn track_stale_served() {
    counter!("cache_stale_served_total").increment(1);
}
