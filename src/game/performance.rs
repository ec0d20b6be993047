//! Performance monitoring and adaptive broadcast throttling
//!
//! Tracks tick durations against the frame budget and provides signals for:
//! - Bot spawning (stop adding bots when the tick is struggling)
//! - Snapshot cadence (slow broadcasts down under load or many viewers)

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::NetConfig;

/// Samples kept in the rolling window (~2 seconds at 60Hz)
const WINDOW_SAMPLES: usize = 120;

/// Samples required before the status moves off its initial value
const MIN_SAMPLES: usize = 10;

/// Performance status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceStatus {
    /// Under 30% of the frame budget
    Excellent,
    /// Under 70%
    Good,
    /// Under 100%
    Warning,
    /// Over budget
    Critical,
}

impl PerformanceStatus {
    pub fn can_add_bots(&self) -> bool {
        matches!(self, PerformanceStatus::Excellent | PerformanceStatus::Good)
    }
}

/// Rolling tick-duration monitor
pub struct PerformanceMonitor {
    tick_durations: VecDeque<Duration>,
    /// Frame budget
    target_tick_duration: Duration,
    status: PerformanceStatus,
    tick_start: Option<Instant>,
}

impl PerformanceMonitor {
    pub fn new(frame_interval_ms: u64) -> Self {
        Self {
            tick_durations: VecDeque::with_capacity(WINDOW_SAMPLES),
            target_tick_duration: Duration::from_millis(frame_interval_ms.max(1)),
            status: PerformanceStatus::Excellent,
            tick_start: None,
        }
    }

    /// Change the budget after a tick-rate update
    pub fn set_frame_interval(&mut self, frame_interval_ms: u64) {
        self.target_tick_duration = Duration::from_millis(frame_interval_ms.max(1));
        self.update_status();
    }

    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// Stop timing and record; returns the measured duration
    pub fn tick_end(&mut self) -> Option<Duration> {
        let duration = self.tick_start.take()?.elapsed();
        self.record_tick(duration);
        Some(duration)
    }

    pub fn record_tick(&mut self, duration: Duration) {
        self.tick_durations.push_back(duration);
        while self.tick_durations.len() > WINDOW_SAMPLES {
            self.tick_durations.pop_front();
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        if self.tick_durations.len() < MIN_SAMPLES {
            return;
        }

        let ratio = self.budget_ratio();
        self.status = if ratio < 0.3 {
            PerformanceStatus::Excellent
        } else if ratio < 0.7 {
            PerformanceStatus::Good
        } else if ratio < 1.0 {
            PerformanceStatus::Warning
        } else {
            PerformanceStatus::Critical
        };
    }

    pub fn average_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.tick_durations.iter().sum();
        sum / self.tick_durations.len() as u32
    }

    fn percentile(&self, p: f32) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.tick_durations.iter().copied().collect();
        sorted.sort();
        let idx = (sorted.len() as f32 * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn p95_tick_duration(&self) -> Duration {
        self.percentile(0.95)
    }

    pub fn p99_tick_duration(&self) -> Duration {
        self.percentile(0.99)
    }

    pub fn max_tick_duration(&self) -> Duration {
        self.tick_durations.iter().max().copied().unwrap_or(Duration::ZERO)
    }

    /// Average tick time as a fraction of the frame budget
    pub fn budget_ratio(&self) -> f32 {
        self.average_tick_duration().as_secs_f32() / self.target_tick_duration.as_secs_f32()
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    pub fn can_add_bots(&self) -> bool {
        self.status.can_add_bots()
    }
}

/// Broadcast interval for the given load.
///
/// `min_interval * sqrt(max(load, 1)) * sqrt(1 + humans / player_scale)`,
/// clamped to the configured rate range. Both factors grow sub-linearly.
pub fn broadcast_interval_ms(net: &NetConfig, load_ratio: f32, humans: usize) -> u64 {
    let min_interval = net.min_interval_ms();
    let max_interval = net.max_interval_ms().max(min_interval);

    let load_factor = load_ratio.max(1.0).sqrt();
    let scale = net.broadcast_player_scale.max(f32::EPSILON);
    let player_factor = (1.0 + humans as f32 / scale).sqrt();

    let interval = (min_interval as f32 * load_factor * player_factor).round();
    if !interval.is_finite() {
        return max_interval;
    }
    (interval as u64).clamp(min_interval, max_interval)
}

/// Adaptive snapshot cadence, re-evaluated on its own slower interval
#[derive(Debug, Clone)]
pub struct BroadcastThrottle {
    interval_ms: u64,
    last_check_ms: Option<u64>,
}

impl BroadcastThrottle {
    pub fn new(net: &NetConfig) -> Self {
        Self {
            interval_ms: net.min_interval_ms(),
            last_check_ms: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Recompute if the check interval has passed. Returns the new interval
    /// when it changed.
    pub fn maybe_update(&mut self, net: &NetConfig, monitor: &PerformanceMonitor, humans: usize, now_ms: u64) -> Option<u64> {
        if let Some(last) = self.last_check_ms {
            if now_ms.saturating_sub(last) < net.broadcast_check_interval_ms {
                return None;
            }
        }
        self.last_check_ms = Some(now_ms);

        let interval = broadcast_interval_ms(net, monitor.budget_ratio(), humans);
        if interval == self.interval_ms {
            return None;
        }
        debug!(
            "Broadcast interval {}ms -> {}ms ({} humans, {:.0}% budget)",
            self.interval_ms,
            interval,
            humans,
            monitor.budget_ratio() * 100.0
        );
        self.interval_ms = interval;
        Some(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_monitor_new() {
        let monitor = PerformanceMonitor::new(16);
        assert_eq!(monitor.status(), PerformanceStatus::Excellent);
        assert_eq!(monitor.average_tick_duration(), Duration::ZERO);
    }

    #[test]
    fn test_status_levels() {
        let cases = [
            (2, PerformanceStatus::Excellent),
            (8, PerformanceStatus::Good),
            (13, PerformanceStatus::Warning),
            (20, PerformanceStatus::Critical),
        ];
        for (ms, expected) in cases {
            let mut monitor = PerformanceMonitor::new(16);
            for _ in 0..20 {
                monitor.record_tick(Duration::from_millis(ms));
            }
            assert_eq!(monitor.status(), expected, "{}ms", ms);
        }
    }

    #[test]
    fn test_bots_gated_on_load() {
        let mut monitor = PerformanceMonitor::new(16);
        for _ in 0..20 {
            monitor.record_tick(Duration::from_millis(14));
        }
        assert!(!monitor.can_add_bots());
    }

    #[test]
    fn test_percentiles() {
        let mut monitor = PerformanceMonitor::new(16);
        for ms in 1..=100 {
            monitor.record_tick(Duration::from_millis(ms));
        }
        assert_eq!(monitor.max_tick_duration(), Duration::from_millis(100));
        assert_eq!(monitor.p95_tick_duration(), Duration::from_millis(96));
        assert!(monitor.p99_tick_duration() >= monitor.p95_tick_duration());
    }

    #[test]
    fn test_tick_timing() {
        let mut monitor = PerformanceMonitor::new(16);
        monitor.tick_start();
        std::thread::sleep(Duration::from_millis(1));
        assert!(monitor.tick_end().is_some());
        assert!(monitor.tick_end().is_none());
    }

    #[test]
    fn test_interval_idle_server_runs_fastest() {
        let net = NetConfig::default();
        assert_eq!(broadcast_interval_ms(&net, 0.1, 0), net.min_interval_ms());
    }

    #[test]
    fn test_interval_grows_with_load_and_players() {
        let net = NetConfig::default();
        let base = broadcast_interval_ms(&net, 1.0, 0);
        let loaded = broadcast_interval_ms(&net, 2.0, 0);
        let crowded = broadcast_interval_ms(&net, 1.0, 50);
        assert!(loaded > base);
        assert!(crowded > base);

        // 33ms * sqrt(2) for 50 players at scale 50
        let expected = (net.min_interval_ms() as f32 * 2f32.sqrt()).round() as u64;
        assert_eq!(crowded, expected);
    }

    #[test]
    fn test_interval_clamped() {
        let net = NetConfig::default();
        assert_eq!(broadcast_interval_ms(&net, 1_000.0, 10_000), net.max_interval_ms());
        assert_eq!(broadcast_interval_ms(&net, f32::NAN, 0), net.min_interval_ms());
    }

    #[test]
    fn test_throttle_check_interval() {
        let net = NetConfig::default();
        let mut monitor = PerformanceMonitor::new(16);
        for _ in 0..20 {
            monitor.record_tick(Duration::from_millis(1));
        }
        let mut throttle = BroadcastThrottle::new(&net);

        assert_eq!(throttle.maybe_update(&net, &monitor, 0, 0), None);
        // Too soon: ignored even though the player count changed
        assert_eq!(throttle.maybe_update(&net, &monitor, 500, 100), None);
        let changed = throttle.maybe_update(&net, &monitor, 500, net.broadcast_check_interval_ms);
        assert!(changed.is_some());
        assert_eq!(throttle.interval_ms(), changed.unwrap());
    }
}
