// perf.rs - Timing instrumentation for script preprocessing
//
// Off unless CSXPP_PERF is set:
//   CSXPP_PERF=1 csxpp batch ./scripts        # Log phase durations
//   CSXPP_PERF=verbose csxpp batch ./scripts  # Also warn on slow phases

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

const PERF_ENV: &str = "CSXPP_PERF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PerfMode {
    Off,
    On,
    Verbose,
}

impl PerfMode {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            None => PerfMode::Off,
            Some(v) if v.is_empty() || v == "0" || v == "false" => PerfMode::Off,
            Some(v) if v == "verbose" => PerfMode::Verbose,
            Some(_) => PerfMode::On,
        }
    }
}

fn mode() -> PerfMode {
    static MODE: OnceLock<PerfMode> = OnceLock::new();
    *MODE.get_or_init(|| PerfMode::parse(std::env::var(PERF_ENV).ok().as_deref()))
}

pub fn is_enabled() -> bool {
    mode() != PerfMode::Off
}

pub fn is_verbose() -> bool {
    mode() == PerfMode::Verbose
}

/// Logs how long its scope took when dropped.
///
/// ```
/// use csxpp::perf::TimingGuard;
///
/// let _timing = TimingGuard::new("preprocess:file");
/// ```
pub struct TimingGuard {
    label: &'static str,
    started: Instant,
    warn_after: Option<Duration>,
    active: bool,
}

impl TimingGuard {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
            warn_after: None,
            active: is_enabled(),
        }
    }

    /// In verbose mode, also warn when the scope runs longer than `threshold_ms`.
    pub fn with_threshold(label: &'static str, threshold_ms: u64) -> Self {
        let mut guard = Self::new(label);
        guard.warn_after = Some(Duration::from_millis(threshold_ms));
        guard
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// End the timed scope now: log it as a drop would and hand back the
    /// elapsed time.
    pub fn finish(self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let took = self.started.elapsed();
        log::info!("[PERF] {}: {:?}", self.label, took);

        match self.warn_after {
            Some(limit) if took > limit && is_verbose() => {
                log::warn!("[PERF] {} is slow: {:?} (limit {:?})", self.label, took, limit);
            }
            _ => {}
        }
    }
}

/// Counters from the most recent batch run.
#[derive(Debug, Default, Clone)]
pub struct BatchMetrics {
    pub discovery: Option<Duration>,
    pub preprocessing: Option<Duration>,
    pub entries_found: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchMetrics {
    pub fn log_summary(&self) {
        if !is_enabled() {
            return;
        }
        log::info!("[PERF] batch summary");
        if let Some(took) = self.discovery {
            log::info!("[PERF]   discovery   {:?}  {} entries", took, self.entries_found);
        }
        if let Some(took) = self.preprocessing {
            log::info!(
                "[PERF]   preprocess  {:?}  {} ok / {} failed",
                took,
                self.succeeded,
                self.failed
            );
        }
        log::info!("[PERF]   files read  {}", files_read());
    }
}

pub fn batch_metrics() -> &'static Mutex<BatchMetrics> {
    static METRICS: OnceLock<Mutex<BatchMetrics>> = OnceLock::new();
    METRICS.get_or_init(|| Mutex::new(BatchMetrics::default()))
}

fn update_metrics(apply: impl FnOnce(&mut BatchMetrics)) {
    if !is_enabled() {
        return;
    }
    if let Ok(mut metrics) = batch_metrics().lock() {
        apply(&mut metrics);
    }
}

pub fn record_discovery(took: Duration, entries: usize) {
    update_metrics(|m| {
        m.discovery = Some(took);
        m.entries_found = entries;
    });
}

pub fn record_preprocess(took: Duration, succeeded: usize, failed: usize) {
    update_metrics(|m| {
        m.preprocessing = Some(took);
        m.succeeded = succeeded;
        m.failed = failed;
    });
}

static FILES_READ: AtomicUsize = AtomicUsize::new(0);

/// Called by the disk file system on every script read.
pub fn increment_files_read() {
    FILES_READ.fetch_add(1, Ordering::Relaxed);
}

pub fn files_read() -> usize {
    FILES_READ.load(Ordering::Relaxed)
}

/// High-water mark of this process's resident memory, in bytes.
///
/// `None` where the platform has no cheap way to ask (anything but macOS and
/// Linux).
pub fn peak_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        macos_max_rss()
    }
    #[cfg(target_os = "linux")]
    {
        linux_vm_hwm()
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

#[cfg(target_os = "macos")]
fn macos_max_rss() -> Option<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    // SAFETY: getrusage fills `usage` and reports failure through its return code.
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) } != 0 {
        return None;
    }
    // SAFETY: the call above returned 0.
    let usage = unsafe { usage.assume_init() };
    // ru_maxrss is in bytes on macOS
    Some(usage.ru_maxrss as u64)
}

#[cfg(target_os = "linux")]
fn linux_vm_hwm() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let field = status.lines().find_map(|line| line.strip_prefix("VmHWM:"))?;
    let kib: u64 = field.trim().trim_end_matches("kB").trim().parse().ok()?;
    Some(kib * 1024)
}
