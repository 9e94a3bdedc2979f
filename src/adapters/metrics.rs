//! Host utilisation adapters.
//!
//! - **`host-metrics` feature** [`SysinfoMetrics`] reads memory use and
//!   per-core CPU load through `sysinfo`.  CPU load is measured between
//!   consecutive refreshes, so the very first sample reports 0 %.
//! - [`NullMetrics`] reports nothing; used when the feature is off and in
//!   tests.

use crate::app::ports::{HostMetrics, HostMetricsPort};

#[cfg(feature = "host-metrics")]
pub use self::sysinfo_impl::SysinfoMetrics;

#[cfg(feature = "host-metrics")]
mod sysinfo_impl {
    use sysinfo::System;

    use super::{HostMetrics, HostMetricsPort};

    pub struct SysinfoMetrics {
        system: System,
    }

    impl Default for SysinfoMetrics {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SysinfoMetrics {
        pub fn new() -> Self {
            Self {
                system: System::new_all(),
            }
        }
    }

    impl HostMetricsPort for SysinfoMetrics {
        fn sample(&mut self) -> HostMetrics {
            self.system.refresh_memory();
            self.system.refresh_cpu_usage();

            let total = self.system.total_memory();
            let memory_percent = if total == 0 {
                0.0
            } else {
                (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
            };
            HostMetrics {
                memory_percent,
                cpu_percent: self.system.cpus().iter().map(sysinfo::Cpu::cpu_usage).collect(),
            }
        }
    }
}

/// Metrics adapter that reports zero memory use and no cores.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

impl HostMetricsPort for NullMetrics {
    fn sample(&mut self) -> HostMetrics {
        HostMetrics::default()
    }
}

/// Best available metrics source for this build.
pub fn host_metrics() -> Box<dyn HostMetricsPort + Send> {
    #[cfg(feature = "host-metrics")]
    {
        Box::new(SysinfoMetrics::new())
    }

    #[cfg(not(feature = "host-metrics"))]
    {
        log::info!("Host metrics disabled; recording zeros");
        Box::new(NullMetrics)
    }
}
