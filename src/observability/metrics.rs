//! Thread-safe metrics collection system
//!
//! Atomic counters for pipeline runs and token usage, plus mutex-protected
//! collections for run durations and per-tool / per-stage statistics.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    runs_started: AtomicU64,
    runs_in_progress: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    runs_rejected: AtomicU64,

    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    llm_requests: AtomicU64,

    // in milliseconds
    run_durations: Mutex<Vec<u64>>,
    stage_completions: Mutex<HashMap<String, u64>>,
    tool_stats: Mutex<HashMap<String, ToolExecutionStats>>,

    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_in_progress: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            runs_rejected: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            llm_requests: AtomicU64::new(0),
            run_durations: Mutex::new(Vec::new()),
            stage_completions: Mutex::new(HashMap::new()),
            tool_stats: Mutex::new(HashMap::new()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // Run metrics
    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        self.runs_in_progress.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self, duration: Duration) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.runs_in_progress.fetch_sub(1, Ordering::Relaxed);
        self.record_run_duration(duration);
    }

    pub fn run_failed(&self, duration: Duration) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.runs_in_progress.fetch_sub(1, Ordering::Relaxed);
        self.record_run_duration(duration);
    }

    /// A request refused before any stage ran (blank credentials)
    pub fn run_rejected(&self) {
        self.runs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_run_duration(&self, duration: Duration) {
        if let Ok(mut times) = self.run_durations.lock() {
            times.push(duration.as_millis() as u64);
            if times.len() > MAX_SAMPLES {
                times.remove(0);
            }
        }
    }

    // Stage metrics
    pub fn stage_completed(&self, stage: &str) {
        if let Ok(mut stages) = self.stage_completions.lock() {
            *stages.entry(stage.to_string()).or_insert(0) += 1;
        }
    }

    // LLM metrics
    pub fn llm_request_completed(&self, prompt_tokens: u32, completion_tokens: u32) {
        self.llm_requests.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion_tokens as u64, Ordering::Relaxed);
    }

    /// Update tool execution statistics (pure function)
    fn update_tool_execution_stats(
        tool_stats: &mut ToolExecutionStats,
        duration: Duration,
        success: bool,
    ) {
        tool_stats.executions += 1;
        tool_stats.last_execution = current_timestamp();
        tool_stats.execution_times.push(duration.as_millis() as u64);

        if tool_stats.execution_times.len() > MAX_SAMPLES {
            tool_stats.execution_times.remove(0);
        }

        if !success {
            tool_stats.failures += 1;
        }
    }

    // Tool execution metrics
    pub fn tool_executed(&self, tool_name: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.tool_stats.lock() {
            let tool_stats = stats.entry(tool_name.to_string()).or_default();
            Self::update_tool_execution_stats(tool_stats, duration, success);
        }
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_in_progress,
            &self.runs_completed,
            &self.runs_failed,
            &self.runs_rejected,
            &self.prompt_tokens,
            &self.completion_tokens,
            &self.llm_requests,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);

        if let Ok(mut times) = self.run_durations.lock() {
            times.clear();
        }
        if let Ok(mut stages) = self.stage_completions.lock() {
            stages.clear();
        }
        if let Ok(mut stats) = self.tool_stats.lock() {
            stats.clear();
        }
    }

    /// Calculate run duration statistics (avg, p50, p95)
    fn calculate_duration_statistics(&self) -> (f64, f64, f64) {
        let Ok(times) = self.run_durations.lock() else {
            return (0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted_times = times.clone();
        sorted_times.sort_unstable();

        let avg = sorted_times.iter().sum::<u64>() as f64 / sorted_times.len() as f64;
        (
            avg,
            percentile(&sorted_times, 50.0),
            percentile(&sorted_times, 95.0),
        )
    }

    /// Create tool execution snapshot (pure function)
    fn create_tool_snapshot(stats: &ToolExecutionStats) -> ToolExecutionStatsSnapshot {
        let avg_execution_time = if stats.execution_times.is_empty() {
            0.0
        } else {
            stats.execution_times.iter().sum::<u64>() as f64 / stats.execution_times.len() as f64
        };

        let success_rate = if stats.executions == 0 {
            0.0
        } else {
            (stats.executions - stats.failures) as f64 / stats.executions as f64
        };

        ToolExecutionStatsSnapshot {
            executions: stats.executions,
            failures: stats.failures,
            avg_execution_time_ms: avg_execution_time,
            last_execution: stats.last_execution,
            success_rate,
        }
    }

    fn build_tool_metrics(&self) -> ToolMetrics {
        let Ok(stats) = self.tool_stats.lock() else {
            return ToolMetrics::default();
        };

        let tool_stats: HashMap<String, ToolExecutionStatsSnapshot> = stats
            .iter()
            .map(|(name, s)| (name.clone(), Self::create_tool_snapshot(s)))
            .collect();

        ToolMetrics {
            total_executions: stats.values().map(|s| s.executions).sum(),
            total_failures: stats.values().map(|s| s.failures).sum(),
            tool_stats,
        }
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_duration_ms, p50, p95) = self.calculate_duration_statistics();

        let stage_completions = self
            .stage_completions
            .lock()
            .map(|stages| stages.clone())
            .unwrap_or_default();

        let prompt_tokens = self.prompt_tokens.load(Ordering::Relaxed);
        let completion_tokens = self.completion_tokens.load(Ordering::Relaxed);

        MetricsSnapshot {
            runs: RunMetrics {
                runs_started: self.runs_started.load(Ordering::Relaxed),
                runs_in_progress: self.runs_in_progress.load(Ordering::Relaxed),
                runs_completed: self.runs_completed.load(Ordering::Relaxed),
                runs_failed: self.runs_failed.load(Ordering::Relaxed),
                runs_rejected: self.runs_rejected.load(Ordering::Relaxed),
                avg_duration_ms,
                duration_p50_ms: p50,
                duration_p95_ms: p95,
            },
            stages: StageMetrics {
                completions: stage_completions,
            },
            tools: self.build_tool_metrics(),
            llm: LlmMetrics {
                requests: self.llm_requests.load(Ordering::Relaxed),
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Internal tool statistics (with timing data)
#[derive(Debug, Default)]
struct ToolExecutionStats {
    executions: u64,
    failures: u64,
    execution_times: Vec<u64>, // milliseconds
    last_execution: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub runs: RunMetrics,
    pub stages: StageMetrics,
    pub tools: ToolMetrics,
    pub llm: LlmMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct RunMetrics {
    pub runs_started: u64,
    pub runs_in_progress: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub runs_rejected: u64,
    pub avg_duration_ms: f64,
    pub duration_p50_ms: f64,
    pub duration_p95_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct StageMetrics {
    /// Successful completions keyed by stage name
    pub completions: HashMap<String, u64>,
}

#[derive(Debug, Default, Serialize)]
pub struct ToolMetrics {
    pub tool_stats: HashMap<String, ToolExecutionStatsSnapshot>,
    pub total_executions: u64,
    pub total_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct ToolExecutionStatsSnapshot {
    pub executions: u64,
    pub failures: u64,
    pub avg_execution_time_ms: f64,
    pub last_execution: u64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct LlmMetrics {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_value = sorted_data[index.floor() as usize] as f64;
        let upper_value = sorted_data[index.ceil() as usize] as f64;

        lower_value + (upper_value - lower_value) * index.fract()
    }
}
