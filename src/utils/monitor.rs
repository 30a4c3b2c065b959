#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, System};

/// Resource snapshot of the running process at the end of a phase.
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub phase_time: Duration,
    pub total_time: Duration,
    pub cpu_percent: f32,
    pub rss_mb: u64,
    pub peak_rss_mb: u64,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    phase_started: Instant,
    peak_rss_mb: u64,
}

/// Logs how long each batch phase took and how much memory the process held.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    enabled: bool,
    pid: Option<Pid>,
    started: Instant,
    state: Mutex<MonitorState>,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid()
                .map_err(|e| tracing::warn!("System monitoring unavailable: {}", e))
                .ok()
        } else {
            None
        };

        let mut system = System::new();
        if pid.is_some() {
            system.refresh_all();
        }

        let now = Instant::now();
        Self {
            enabled,
            pid,
            started: now,
            state: Mutex::new(MonitorState {
                system,
                phase_started: now,
                peak_rss_mb: 0,
            }),
        }
    }

    /// Closes the current phase and starts the next one.
    pub fn finish_phase(&self, phase: &str) -> Option<PhaseStats> {
        let pid = self.pid?;
        let mut state = self.state.lock().ok()?;

        state.system.refresh_all();
        let (cpu_percent, rss_mb) = state
            .system
            .process(pid)
            .map(|p| (p.cpu_usage(), p.memory() / 1024 / 1024))?;

        state.peak_rss_mb = state.peak_rss_mb.max(rss_mb);
        let phase_time = state.phase_started.elapsed();
        state.phase_started = Instant::now();

        Some(PhaseStats {
            phase: phase.to_string(),
            phase_time,
            total_time: self.started.elapsed(),
            cpu_percent,
            rss_mb,
            peak_rss_mb: state.peak_rss_mb,
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.finish_phase(phase) {
            tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, RSS: {}MB",
                stats.phase,
                stats.phase_time,
                stats.cpu_percent,
                stats.rss_mb
            );
        }
    }

    pub fn log_final_stats(&self) {
        if !self.is_enabled() {
            return;
        }
        let peak = self.state.lock().map(|s| s.peak_rss_mb).unwrap_or_default();
        tracing::info!(
            "📊 Run finished in {:?}, peak RSS {}MB",
            self.started.elapsed(),
            peak
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.pid.is_some()
    }
}

// 非 CLI 建置：沒有 sysinfo，全部不做事
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_is_silent() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        monitor.log_stats("Extract");
        monitor.log_final_stats();
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(monitor.finish_phase("Extract").is_none());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_enabled_monitor_tracks_peak() {
        let monitor = SystemMonitor::new(true);
        if let Some(first) = monitor.finish_phase("Extract") {
            let second = monitor.finish_phase("Validate").unwrap();
            assert!(second.peak_rss_mb >= first.rss_mb);
            assert!(second.total_time >= first.total_time);
            assert_eq!(second.phase, "Validate");
        }
    }
}
