//! Interface to the pluggable power-model collaborators
//!
//! The regression models themselves (linear, logistic, logarithmic,
//! exponential) live outside this crate; the estimation pipeline consumes
//! them through [`PowerEstimator`].

use serde::{Deserialize, Serialize};

/// Raw per-process counters delivered by the eBPF collection collaborator,
/// keyed by the same (cgroup ID, PID) pair the resolver operates on
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CounterSample {
    pub cgroup_id: u64,
    pub pid: u32,
    pub cpu_cycles: u64,
    pub instructions: u64,
    pub cache_misses: u64,
    pub run_time_us: u64,
}

/// Component-level power figures in watts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerEstimate {
    pub package_watts: f64,
    pub core_watts: f64,
    pub dram_watts: f64,
    pub uncore_watts: f64,
    pub platform_watts: f64,
    pub gpu_watts: f64,
}

/// A trained power model, applied to one counter sample at a time
pub trait PowerEstimator: Send + Sync {
    fn estimate(&self, sample: &CounterSample) -> PowerEstimate;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stand-in model: watts linear in cycles
    struct CyclesLinear {
        watts_per_gcycle: f64,
    }

    impl PowerEstimator for CyclesLinear {
        fn estimate(&self, sample: &CounterSample) -> PowerEstimate {
            let package = sample.cpu_cycles as f64 / 1e9 * self.watts_per_gcycle;
            PowerEstimate {
                package_watts: package,
                core_watts: package * 0.8,
                ..PowerEstimate::default()
            }
        }
    }

    #[test]
    fn test_estimator_interface() {
        let model = CyclesLinear {
            watts_per_gcycle: 2.0,
        };
        let sample = CounterSample {
            cpu_cycles: 3_000_000_000,
            ..CounterSample::default()
        };

        let estimate = model.estimate(&sample);
        assert!((estimate.package_watts - 6.0).abs() < 1e-9);
        assert!((estimate.core_watts - 4.8).abs() < 1e-9);
        assert_eq!(estimate.gpu_watts, 0.0);
    }
}
