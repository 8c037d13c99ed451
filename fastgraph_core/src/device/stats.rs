/// Timing statistics for one kernel.
///
/// Uses Welford's online algorithm so variance is available without storing
/// samples.
#[derive(Debug, Clone)]
pub struct KernelStats {
    /// Kernel (node) name
    pub name: String,
    /// Average compute time in microseconds
    pub avg_us: f64,
    /// Standard deviation in microseconds
    pub stddev_us: f64,
    /// Total compute time in microseconds
    pub total_us: f64,
    /// Number of invocations
    pub count: usize,
    pub min_us: f64,
    pub max_us: f64,
    mean: f64,
    m2: f64,
}

impl KernelStats {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            avg_us: 0.0,
            stddev_us: 0.0,
            total_us: 0.0,
            count: 0,
            min_us: f64::MAX,
            max_us: 0.0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Record one invocation
    pub fn update(&mut self, duration_us: f64) {
        self.count += 1;
        self.total_us += duration_us;

        self.min_us = self.min_us.min(duration_us);
        self.max_us = self.max_us.max(duration_us);

        let delta = duration_us - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = duration_us - self.mean;
        self.m2 += delta * delta2;

        self.avg_us = self.mean;
        if self.count > 1 {
            self.stddev_us = (self.m2 / (self.count - 1) as f64).sqrt();
        }
    }

    /// 95th percentile estimate (mean + 2*stddev)
    pub fn p95_us(&self) -> f64 {
        self.avg_us + 2.0 * self.stddev_us
    }
}
