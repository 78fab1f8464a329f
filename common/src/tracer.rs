use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

pub struct TracerOptions {
    /// Level used when `RUST_LOG` is not set.
    pub fallback_level: LevelFilter,
    /// Include the emitting module in each line.
    pub show_target: bool,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            fallback_level: LevelFilter::INFO,
            show_target: false,
        }
    }
}

/// Installs the stdout tracer for a binary. Create one at the start of `main`.
pub struct TracerEngine {
    level: LevelFilter,
}

impl TracerEngine {
    /// Filtering comes from `RUST_LOG` when set, otherwise from
    /// `options.fallback_level`.
    pub fn new(options: TracerOptions) -> Self {
        let log_filter = EnvFilter::builder()
            .with_default_directive(options.fallback_level.into())
            .from_env_lossy();
        let level = log_filter.max_level_hint().unwrap_or(options.fallback_level);

        let stdout_tracer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(options.show_target);

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));

        // A subscriber installed earlier (e.g. by a test harness) stays in place.
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::warn!("Global tracing subscriber already set");
        }

        Self { level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}
