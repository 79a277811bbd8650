//! Tracing event selection and subscriber setup.

use std::{collections::HashSet, fmt::Display};

use spawnkit_core::trace_categories;
use tracing_subscriber::{
    Layer, Registry, filter::Targets, layer::SubscriberExt, reload::Handle, util::SubscriberInitExt,
};

use crate::error::CliError;

/// Type of event to trace.
#[derive(Clone, Debug, Eq, Hash, PartialEq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    /// Traces descriptor lifecycle, including close failures.
    #[clap(name = "fds")]
    Fds,
    /// Traces stream binding, spawning, and exec failures.
    #[clap(name = "spawn")]
    Spawn,
    /// Traces polling, waiting, reaping, and signalling.
    #[clap(name = "wait")]
    Wait,
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fds => write!(f, "fds"),
            Self::Spawn => write!(f, "spawn"),
            Self::Wait => write!(f, "wait"),
        }
    }
}

#[derive(Default)]
pub(crate) struct TraceEventConfig {
    enabled_trace_events: HashSet<TraceEvent>,
    handle: Option<Handle<Targets, Registry>>,
}

impl TraceEventConfig {
    pub fn init(enabled_log_events: &[TraceEvent]) -> Self {
        let enabled_trace_events: HashSet<TraceEvent> = enabled_log_events.iter().cloned().collect();

        let mut config = Self {
            enabled_trace_events,
            ..Default::default()
        };

        let filter = config.compose_filter();

        // Reloadable, so events requested by the config file can be switched on
        // after it has been read.
        let (reload_filter, handle) = tracing_subscriber::reload::Layer::new(filter);

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(reload_filter);

        if tracing_subscriber::registry().with(layer).try_init().is_ok() {
            config.handle = Some(handle);
        } else {
            eprintln!("warning: failed to initialize tracing.");
        }

        config
    }

    fn compose_filter(&self) -> Targets {
        let mut filter = Targets::new().with_default(tracing_subscriber::filter::LevelFilter::INFO);

        for event in &self.enabled_trace_events {
            let target = match event {
                TraceEvent::Fds => trace_categories::FDS,
                TraceEvent::Spawn => trace_categories::SPAWN,
                TraceEvent::Wait => trace_categories::WAIT,
            };

            filter = filter.with_target(target, tracing::Level::DEBUG);
        }

        filter
    }

    pub const fn get_enabled_events(&self) -> &HashSet<TraceEvent> {
        &self.enabled_trace_events
    }

    /// Enables additional events, reloading the filter if anything changed.
    pub fn enable_all<'a>(&mut self, events: impl IntoIterator<Item = &'a TraceEvent>) -> Result<(), CliError> {
        let mut changed = false;
        for event in events {
            changed |= self.enabled_trace_events.insert(event.to_owned());
        }

        // Don't bother to reload config if nothing has changed.
        if !changed {
            return Ok(());
        }

        self.reload_filter()
    }

    fn reload_filter(&self) -> Result<(), CliError> {
        match &self.handle {
            Some(handle) => handle
                .reload(self.compose_filter())
                .map_err(|e| CliError::Tracing(e.to_string())),
            None => Err(CliError::Tracing("tracing not initialized".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_map_to_library_targets() {
        let config = TraceEventConfig {
            enabled_trace_events: [TraceEvent::Spawn].into_iter().collect(),
            handle: None,
        };

        let filter = config.compose_filter();
        assert!(filter.would_enable(trace_categories::SPAWN, &tracing::Level::DEBUG));
        assert!(!filter.would_enable(trace_categories::WAIT, &tracing::Level::DEBUG));
        assert!(filter.would_enable(trace_categories::WAIT, &tracing::Level::INFO));
    }

    #[test]
    fn enabling_without_subscriber_reports_error() {
        let mut config = TraceEventConfig::default();

        // Nothing new: no reload is attempted.
        assert!(config.enable_all(&[]).is_ok());

        assert!(config.enable_all(&[TraceEvent::Fds]).is_err());
        assert!(config.get_enabled_events().contains(&TraceEvent::Fds));
    }
}
