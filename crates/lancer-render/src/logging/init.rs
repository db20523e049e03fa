use std::sync::Once;

use log::LevelFilter;

/// Targets whose output drowns the renderer's own at info level.
const NOISY_TARGETS: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

/// How renderer output is filtered and styled.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives, e.g. `"lancer_render=debug,wgpu_core=warn"`.
    /// Wins over `RUST_LOG`; either one replaces the defaults below entirely.
    pub env_filter: Option<String>,
    /// Lets `lancer_render` emit its per-flush and per-replay traces under the
    /// default filter.
    pub frame_traces: bool,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            frame_traces: false,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Only the first call has any effect.
///
/// A logger installed by the host beforehand is kept; the renderer then logs
/// through it.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let directives = config
            .env_filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok());
        if builder(&config, directives.as_deref()).try_init().is_err() {
            log::debug!("logger already installed; keeping it");
            return;
        }
        log::debug!("logging initialized (frame traces: {})", config.frame_traces);
    });
}

fn builder(config: &LoggingConfig, directives: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    match directives {
        Some(filter) => {
            builder.parse_filters(filter);
        }
        None => {
            builder.filter_level(LevelFilter::Info);
            for target in NOISY_TARGETS {
                builder.filter_module(target, LevelFilter::Warn);
            }
            if config.frame_traces {
                builder.filter_module("lancer_render", LevelFilter::Trace);
            }
        }
    }
    builder.write_style(config.write_style);
    builder
}

#[cfg(test)]
mod tests {
    use log::{Level, Log, Metadata};

    use super::*;

    fn enabled(logger: &env_logger::Logger, target: &str, level: Level) -> bool {
        logger.enabled(&Metadata::builder().target(target).level(level).build())
    }

    #[test]
    fn default_filter_quiets_wgpu_and_frame_traces() {
        let logger = builder(&LoggingConfig::default(), None).build();

        assert!(enabled(&logger, "lancer_render::device", Level::Info));
        assert!(!enabled(&logger, "lancer_render::render::context", Level::Trace));
        assert!(!enabled(&logger, "wgpu_core::device", Level::Info));
        assert!(enabled(&logger, "wgpu_hal::vulkan", Level::Warn));
    }

    #[test]
    fn frame_traces_open_the_renderer_only() {
        let config = LoggingConfig {
            frame_traces: true,
            ..LoggingConfig::default()
        };
        let logger = builder(&config, None).build();

        assert!(enabled(&logger, "lancer_render::render::context", Level::Trace));
        assert!(!enabled(&logger, "naga::front", Level::Info));
    }

    #[test]
    fn explicit_directives_replace_the_defaults() {
        let config = LoggingConfig {
            frame_traces: true,
            ..LoggingConfig::default()
        };
        let logger = builder(&config, Some("wgpu_core=debug")).build();

        assert!(enabled(&logger, "wgpu_core::device", Level::Debug));
        assert!(!enabled(&logger, "lancer_render::render::context", Level::Trace));
    }
}
