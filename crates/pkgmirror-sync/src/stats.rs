use std::fmt;
use std::time::{Duration, Instant};

/// Outcome counters for one pass.
#[derive(Clone, Debug)]
pub struct RunStats {
    pub found: usize,
    pub stored: usize,
    pub not_found: usize,
    pub invalid_package: usize,
    pub invalid_url: usize,
    started: Instant,
    elapsed: Option<Duration>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            found: 0,
            stored: 0,
            not_found: 0,
            invalid_package: 0,
            invalid_url: 0,
            started: Instant::now(),
            elapsed: None,
        }
    }

    /// Freeze the elapsed time.
    pub fn finish(&mut self) {
        self.elapsed = Some(self.started.elapsed());
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }

    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            "Statistics".to_string(),
            "----------".to_string(),
            format!("Found (cached):         {}", self.found),
            format!("Stored (downloaded):    {}", self.stored),
            format!("Not found (404):        {}", self.not_found),
            format!("Invalid packages:       {}", self.invalid_package),
            format!("Invalid URLs:           {}", self.invalid_url),
            format!("Runtime:                {}", format_runtime(self.elapsed())),
        ]
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_lines().join("\n"))
    }
}

/// `"42s"` below a minute, `"3m 7s"` style (seconds padded to two columns)
/// above.
pub fn format_runtime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if elapsed > Duration::from_secs(60) {
        format!("{}m{:2}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
