use std::env;

use tracing::Level;

/// How much of the emission pipeline ends up in the log.
///
/// The builder emits three tiers of events: warnings (unrecognised option
/// keys, recorded trace failures, tolerated generator errors), one event per
/// emitted module, and one event per section. The verbosity picks the
/// deepest tier that is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Warnings only: option parse problems and trace failures.
    #[default]
    Failures,
    /// Also one event per emitted module (byte size and function count).
    Modules,
    /// Also one event per emitted section.
    Sections,
}

impl Verbosity {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "failures" | "warn" => Some(Self::Failures),
            "modules" | "info" => Some(Self::Modules),
            "sections" | "debug" => Some(Self::Sections),
            _ => None,
        }
    }

    fn as_level(self) -> Level {
        match self {
            Verbosity::Failures => Level::WARN,
            Verbosity::Modules => Level::INFO,
            Verbosity::Sections => Level::DEBUG,
        }
    }
}

/// Log configuration an embedding host hands to [`init`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub verbosity: Verbosity,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl LogOptions {
    /// Read `JITWASM_LOG` (a [`Verbosity`] name) and `JITWASM_LOG_JSON`.
    /// Unrecognised verbosity names keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        let verbosity = env::var("JITWASM_LOG")
            .ok()
            .as_deref()
            .and_then(Verbosity::parse)
            .unwrap_or_default();
        Self {
            verbosity,
            json: env::var_os("JITWASM_LOG_JSON").is_some(),
        }
    }
}

/// Install a global `tracing` subscriber for the given options.
///
/// Embedding hosts that already install their own subscriber can skip this;
/// a second initialisation is ignored.
pub fn init(options: LogOptions) {
    let builder = tracing_subscriber::fmt().with_max_level(options.verbosity.as_level());
    let _ = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::{LogOptions, Verbosity};
    use tracing::Level;

    #[test]
    fn verbosity_names_map_to_event_tiers() {
        assert_eq!(Verbosity::parse("failures"), Some(Verbosity::Failures));
        assert_eq!(Verbosity::parse("MODULES"), Some(Verbosity::Modules));
        assert_eq!(Verbosity::parse("debug"), Some(Verbosity::Sections));
        assert_eq!(Verbosity::parse("everything"), None);
    }

    #[test]
    fn tiers_order_from_quiet_to_chatty() {
        assert!(Verbosity::Failures < Verbosity::Modules);
        assert!(Verbosity::Modules < Verbosity::Sections);
        assert_eq!(Verbosity::Failures.as_level(), Level::WARN);
        assert_eq!(Verbosity::Sections.as_level(), Level::DEBUG);
    }

    #[test]
    fn default_options_log_failures_as_text() {
        let options = LogOptions::default();
        assert_eq!(options.verbosity, Verbosity::Failures);
        assert!(!options.json);
    }
}
