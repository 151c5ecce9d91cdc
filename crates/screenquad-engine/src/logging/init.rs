use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax, e.g.
/// `"screenquad_engine=debug"`. When unset, `RUST_LOG` is consulted, then
/// the level falls back to `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Caps wgpu's own crates at `warn` unless the filter names them.
    pub quiet_wgpu: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            quiet_wgpu: true,
        }
    }
}

const WGPU_TARGETS: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

static INIT: Once = Once::new();

/// Initializes the global logger. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config
            .env_filter
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|f| !f.trim().is_empty());

        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Info);

        if config.quiet_wgpu {
            for target in WGPU_TARGETS {
                if !filter.as_deref().is_some_and(|f| f.contains(target)) {
                    builder.filter_module(target, log::LevelFilter::Warn);
                }
            }
        }
        if let Some(filter) = &filter {
            builder.parse_filters(filter);
        }

        builder.write_style(config.write_style);

        // Tests may have installed a logger already.
        if builder.try_init().is_err() {
            return;
        }
        log::debug!("logging initialized (filter: {})", filter.as_deref().unwrap_or("info"));
    });
}
