//! Per-device packet statistics: counters updated by the radio
//! intake, exposed read-only. A rolling 60 s window of timestamped byte
//! counts backs the per-minute rate calculation; older samples are
//! trimmed lazily on each read rather than by a background sweep.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

const WINDOW_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct PacketCounters {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub errors: u64,
    pub retries: u64,
}

struct WindowSample {
    timestamp_ms: u64,
    bytes: u64,
}

struct PerDevice {
    counters: PacketCounters,
    rx_window: VecDeque<WindowSample>,
    tx_window: VecDeque<WindowSample>,
}

impl Default for PerDevice {
    fn default() -> Self {
        Self {
            counters: PacketCounters::default(),
            rx_window: VecDeque::new(),
            tx_window: VecDeque::new(),
        }
    }
}

/// Tracks `rx_packets, tx_packets, rx_bytes, tx_bytes, errors, retries`
/// per device, plus a rolling window for per-minute rates.
#[derive(Default)]
pub struct PacketStatsTracker {
    devices: DashMap<[u8; 8], Mutex<PerDevice>>,
}

impl PacketStatsTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rx(&self, ieee: [u8; 8], bytes: usize, now_ms: u64) {
        let entry = self.devices.entry(ieee).or_default();
        let mut guard = entry.lock().unwrap();
        guard.counters.rx_packets += 1;
        guard.counters.rx_bytes += bytes as u64;
        guard.rx_window.push_back(WindowSample { timestamp_ms: now_ms, bytes: bytes as u64 });
        trim_window(&mut guard.rx_window, now_ms);
    }

    pub fn record_tx(&self, ieee: [u8; 8], bytes: usize, now_ms: u64) {
        let entry = self.devices.entry(ieee).or_default();
        let mut guard = entry.lock().unwrap();
        guard.counters.tx_packets += 1;
        guard.counters.tx_bytes += bytes as u64;
        guard.tx_window.push_back(WindowSample { timestamp_ms: now_ms, bytes: bytes as u64 });
        trim_window(&mut guard.tx_window, now_ms);
    }

    pub fn record_error(&self, ieee: [u8; 8]) {
        let entry = self.devices.entry(ieee).or_default();
        entry.lock().unwrap().counters.errors += 1;
    }

    pub fn record_retry(&self, ieee: [u8; 8]) {
        let entry = self.devices.entry(ieee).or_default();
        entry.lock().unwrap().counters.retries += 1;
    }

    #[must_use]
    pub fn snapshot(&self, ieee: [u8; 8]) -> Option<PacketCounters> {
        self.devices.get(&ieee).map(|e| e.lock().unwrap().counters)
    }

    /// Received bytes within the trailing 60 s window, as of `now_ms`.
    #[must_use]
    pub fn rx_bytes_per_minute(&self, ieee: [u8; 8], now_ms: u64) -> u64 {
        let Some(entry) = self.devices.get(&ieee) else {
            return 0;
        };
        let mut guard = entry.lock().unwrap();
        trim_window(&mut guard.rx_window, now_ms);
        guard.rx_window.iter().map(|s| s.bytes).sum()
    }

    #[must_use]
    pub fn tx_bytes_per_minute(&self, ieee: [u8; 8], now_ms: u64) -> u64 {
        let Some(entry) = self.devices.get(&ieee) else {
            return 0;
        };
        let mut guard = entry.lock().unwrap();
        trim_window(&mut guard.tx_window, now_ms);
        guard.tx_window.iter().map(|s| s.bytes).sum()
    }
}

fn trim_window(window: &mut VecDeque<WindowSample>, now_ms: u64) {
    while let Some(front) = window.front() {
        if now_ms.saturating_sub(front.timestamp_ms) > WINDOW_MS {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_calls() {
        let tracker = PacketStatsTracker::new();
        let ieee = [1; 8];
        tracker.record_rx(ieee, 20, 1_000);
        tracker.record_rx(ieee, 30, 1_500);
        tracker.record_tx(ieee, 10, 1_200);
        tracker.record_error(ieee);
        tracker.record_retry(ieee);

        let snap = tracker.snapshot(ieee).unwrap();
        assert_eq!(snap.rx_packets, 2);
        assert_eq!(snap.rx_bytes, 50);
        assert_eq!(snap.tx_packets, 1);
        assert_eq!(snap.tx_bytes, 10);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.retries, 1);
    }

    #[test]
    fn window_drops_samples_older_than_sixty_seconds() {
        let tracker = PacketStatsTracker::new();
        let ieee = [2; 8];
        tracker.record_rx(ieee, 100, 0);
        assert_eq!(tracker.rx_bytes_per_minute(ieee, 30_000), 100);
        assert_eq!(tracker.rx_bytes_per_minute(ieee, 61_000), 0);
        // Counters are cumulative and unaffected by window trimming.
        assert_eq!(tracker.snapshot(ieee).unwrap().rx_bytes, 100);
    }

    #[test]
    fn unknown_device_reports_zero_rate_not_a_panic() {
        let tracker = PacketStatsTracker::new();
        assert_eq!(tracker.rx_bytes_per_minute([9; 8], 1_000), 0);
        assert!(tracker.snapshot([9; 8]).is_none());
    }
}
