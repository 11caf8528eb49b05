use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::clock::CorrectedClock;

pub const SYNC_ENDPOINT: &str = "https://www.baidu.com";
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(3);

pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    // Example: 'Tue, 28 Feb 2026 12:00:00 GMT'
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

pub fn offset_from_sample(network: DateTime<Utc>, local: DateTime<Utc>) -> chrono::Duration {
    network - local
}

pub fn fetch_network_time(endpoint: &str, timeout: Duration) -> Option<DateTime<Utc>> {
    let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(err) => {
            warn!("network time client unavailable: {err}");
            return None;
        }
    };

    let response = match client.head(endpoint).send() {
        Ok(response) => response,
        Err(err) => {
            warn!("network time request to {endpoint} failed: {err}");
            return None;
        }
    };

    let Some(header) = response.headers().get(reqwest::header::DATE) else {
        warn!("network time response from {endpoint} carried no Date header");
        return None;
    };

    let parsed = header.to_str().ok().and_then(parse_http_date);
    if parsed.is_none() {
        warn!("network time response from {endpoint} carried an unparseable Date header");
    }
    parsed
}

// Owns the background fetch so the tick path never blocks on the network.
// One attempt in flight at a time; results arriving after cancellation are
// discarded instead of applied.
pub struct TimeSynchronizer {
    clock: CorrectedClock,
    endpoint: String,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TimeSynchronizer {
    pub fn new(clock: CorrectedClock) -> Self {
        Self::with_endpoint(clock, SYNC_ENDPOINT, SYNC_TIMEOUT)
    }

    pub fn with_endpoint(clock: CorrectedClock, endpoint: &str, timeout: Duration) -> Self {
        Self {
            clock,
            endpoint: endpoint.to_string(),
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn trigger(&mut self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("time sync already in flight; request coalesced");
            return;
        }

        if let Some(finished) = self.worker.take() {
            let _ = finished.join();
        }

        let clock = self.clock.clone();
        let endpoint = self.endpoint.clone();
        let timeout = self.timeout;
        let in_flight = Arc::clone(&self.in_flight);
        let cancelled = Arc::clone(&self.cancelled);

        self.worker = Some(thread::spawn(move || {
            let fetched = fetch_network_time(&endpoint, timeout);
            if let Some(network) = fetched {
                let offset = offset_from_sample(network, Utc::now());
                if cancelled.load(Ordering::SeqCst) {
                    debug!("time sync result discarded after shutdown");
                } else {
                    info!("time synced, offset {} ms", offset.num_milliseconds());
                    clock.set_offset(offset);
                }
            } else {
                warn!("time sync failed; offset left unchanged");
            }
            in_flight.store(false, Ordering::SeqCst);
        }));
    }
}

impl Drop for TimeSynchronizer {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_fixed_format_http_date() {
        let parsed = parse_http_date("Tue, 28 Feb 2026 12:00:00 GMT").expect("valid date");
        let expected = Utc
            .with_ymd_and_hms(2026, 2, 28, 12, 0, 0)
            .single()
            .expect("valid datetime");
        assert_eq!(parsed, expected);
    }

    #[test]
    fn rejects_garbage_date_header() {
        assert!(parse_http_date("not-a-date").is_none());
        assert!(parse_http_date("").is_none());
    }

    #[test]
    fn offset_sign_follows_network_minus_local() {
        let local = Utc
            .with_ymd_and_hms(2026, 2, 28, 12, 0, 0)
            .single()
            .expect("valid datetime");
        let ahead = local + chrono::Duration::seconds(42);
        assert_eq!(
            offset_from_sample(ahead, local),
            chrono::Duration::seconds(42)
        );

        let behind = local - chrono::Duration::seconds(10);
        assert_eq!(
            offset_from_sample(behind, local),
            chrono::Duration::seconds(-10)
        );
    }

    #[test]
    fn failed_fetch_leaves_offset_at_zero() {
        let clock = CorrectedClock::new();
        {
            // Nothing listens on this port; the fetch fails fast.
            let mut synchronizer = TimeSynchronizer::with_endpoint(
                clock.clone(),
                "http://127.0.0.1:9",
                Duration::from_millis(500),
            );
            synchronizer.trigger();
        }
        assert_eq!(clock.offset(), chrono::Duration::zero());
    }

    #[test]
    fn retrigger_while_in_flight_is_coalesced() {
        let clock = CorrectedClock::new();
        let mut synchronizer = TimeSynchronizer::with_endpoint(
            clock.clone(),
            "http://127.0.0.1:9",
            Duration::from_millis(500),
        );
        synchronizer.trigger();
        synchronizer.trigger();
        drop(synchronizer);
        assert_eq!(clock.offset(), chrono::Duration::zero());
    }
}
