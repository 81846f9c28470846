use std::time::Duration;

/// Tuning knobs for a running search
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Estimated search tree footprint at which the expansion task halts
    pub memory_limit_bytes: u64,
    /// How often the active first-level node is swapped
    pub rotation_interval: Duration,
    /// How long `start` waits before returning the first solutions
    pub initial_wait: Duration,
    /// How long `stop` waits for the expansion task to observe cancellation
    pub stop_grace: Duration,
    /// Pause between iterations on single-core machines
    pub single_cpu_pause: Duration,
    /// Pause after driving a first-level node that has nothing left
    pub exhausted_pause: Duration,
    /// Maximum number of solutions returned by a query
    pub solutions_cap: usize,
    /// Move to the next first-level node as soon as the active one is exhausted
    /// instead of waiting for the rotation tick
    pub advance_exhausted_roots: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 14 * 1024 * 1024 * 1024,
            rotation_interval: Duration::from_secs(5),
            initial_wait: Duration::from_secs(2),
            stop_grace: Duration::from_secs(1),
            single_cpu_pause: Duration::from_millis(50),
            exhausted_pause: Duration::from_millis(10),
            solutions_cap: 5000,
            advance_exhausted_roots: false,
        }
    }
}

impl SearchConfig {
    /// Builds the default configuration, overridden by `TIMETABLE_*` environment variables
    ///
    /// Durations are read in milliseconds. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse::<u64>("TIMETABLE_MEMORY_LIMIT_BYTES") {
            config.memory_limit_bytes = v;
        }
        // a zero period would make the rotation ticker panic
        if let Some(v) = env_parse::<u64>("TIMETABLE_ROTATION_INTERVAL_MS").filter(|&v| v > 0) {
            config.rotation_interval = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("TIMETABLE_INITIAL_WAIT_MS") {
            config.initial_wait = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("TIMETABLE_STOP_GRACE_MS") {
            config.stop_grace = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<usize>("TIMETABLE_SOLUTIONS_CAP") {
            config.solutions_cap = v;
        }
        if let Some(v) = env_parse::<bool>("TIMETABLE_ADVANCE_EXHAUSTED_ROOTS") {
            config.advance_exhausted_roots = v;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
