//! Structured telemetry client.
//!
//! [`Telemetry`] is independent of the [`Logger`](crate::Logger): it emits
//! one JSON object per record (`timestamp`, `level`, `service`, `message`,
//! `target`) to an exporter. Shipping those records to a hosted dashboard is
//! the exporter's business; any [`MakeWriter`] can act as one.
//!
//! A client built without an exporter forwards its records to whatever
//! process-wide `tracing` dispatcher is installed, under the
//! [`TELEMETRY_TARGET`] target, so an externally provisioned exporter layer
//! can pick them up.
use {
    crate::level::Severity,
    tracing::Dispatch,
    tracing_subscriber::{
        fmt::{self, time::ChronoLocal, writer::BoxMakeWriter, MakeWriter},
        layer::SubscriberExt,
        registry::Registry,
        Layer,
    },
};

/// Target of every record emitted by a [`Telemetry`] client.
pub const TELEMETRY_TARGET: &str = "telemetry";

/// Structured log client for a hosted dashboard.
///
/// ```
/// use mathematica_mcp::{MemorySink, Telemetry};
///
/// let exporter = MemorySink::new();
/// let telemetry = Telemetry::builder()
///     .service_name("worker")
///     .exporter(exporter.clone())
///     .build();
/// telemetry.info("Testing Logfire logging functionality");
/// assert!(exporter.contents().contains("\"service\":\"worker\""));
/// ```
pub struct Telemetry {
    service: String,
    level: Severity,
    dispatch: Option<Dispatch>,
}

impl Telemetry {
    /// Start configuring a client; see [`TelemetryBuilder`] for defaults.
    pub fn builder() -> TelemetryBuilder {
        TelemetryBuilder::new()
    }

    /// A client that forwards to the process-wide dispatcher.
    pub fn global() -> Self {
        Self::builder().build()
    }

    /// Service name attached to every record.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Emit `message` at `severity`. Records below the configured level are
    /// dropped. [`Severity::Critical`] is emitted at `ERROR` with
    /// `critical = true`.
    pub fn log(&self, severity: Severity, message: &str) {
        let service = self.service.as_str();
        let emit = || match severity {
            Severity::Trace => tracing::trace!(target: TELEMETRY_TARGET, service, "{}", message),
            Severity::Debug => tracing::debug!(target: TELEMETRY_TARGET, service, "{}", message),
            Severity::Info => tracing::info!(target: TELEMETRY_TARGET, service, "{}", message),
            Severity::Warning => tracing::warn!(target: TELEMETRY_TARGET, service, "{}", message),
            Severity::Error => tracing::error!(target: TELEMETRY_TARGET, service, "{}", message),
            Severity::Critical => {
                tracing::error!(target: TELEMETRY_TARGET, service, critical = true, "{}", message)
            }
        };
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, emit),
            None if severity >= self.level => emit(),
            None => {}
        }
    }

    /// [`Telemetry::log`] at [`Severity::Trace`].
    pub fn trace(&self, message: &str) {
        self.log(Severity::Trace, message)
    }

    /// [`Telemetry::log`] at [`Severity::Debug`].
    pub fn debug(&self, message: &str) {
        self.log(Severity::Debug, message)
    }

    /// [`Telemetry::log`] at [`Severity::Info`].
    pub fn info(&self, message: &str) {
        self.log(Severity::Info, message)
    }

    /// [`Telemetry::log`] at [`Severity::Warning`].
    pub fn warning(&self, message: &str) {
        self.log(Severity::Warning, message)
    }

    /// [`Telemetry::log`] at [`Severity::Error`].
    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message)
    }

    /// Emitted at `ERROR` with `critical = true`.
    pub fn critical(&self, message: &str) {
        self.log(Severity::Critical, message)
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("service", &self.service)
            .field("level", &self.level)
            .field("exporter", &self.dispatch.is_some())
            .finish()
    }
}

/// Configuration for a [`Telemetry`] client.
///
/// Defaults: service named after this crate, [`Severity::Info`] and up, no
/// exporter.
pub struct TelemetryBuilder {
    service: String,
    level: Severity,
    exporter: Option<BoxMakeWriter>,
}

impl TelemetryBuilder {
    /// Defaults: service named after this crate, INFO and up, no exporter.
    pub fn new() -> Self {
        TelemetryBuilder {
            service: crate::top_level_name(module_path!()).to_string(),
            level: Severity::Info,
            exporter: None,
        }
    }

    /// Value of the `service` field on every record.
    pub fn service_name(self, service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..self
        }
    }

    /// Minimum severity exported.
    pub fn level(self, level: Severity) -> Self {
        Self { level, ..self }
    }

    /// Write JSON records to `exporter` instead of the global dispatcher.
    pub fn exporter<W>(self, exporter: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            exporter: Some(BoxMakeWriter::new(exporter)),
            ..self
        }
    }

    /// Finish the client. With an exporter this builds a private dispatcher
    /// with a single JSON layer; without one, records go to whatever
    /// dispatcher is current when they are emitted.
    pub fn build(self) -> Telemetry {
        let level = self.level;
        let dispatch = self.exporter.map(|exporter| {
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false)
                .with_timer(ChronoLocal::rfc_3339())
                .with_writer(exporter)
                .with_filter(level.layer_filter());
            Dispatch::new(Registry::default().with(layer))
        });
        Telemetry {
            service: self.service,
            level,
            dispatch,
        }
    }
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::sink::MemorySink, serde_json::Value};

    fn records(sink: &MemorySink) -> Vec<Value> {
        sink.lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn exports_one_json_record_per_call() {
        let exporter = MemorySink::new();
        let telemetry = Telemetry::builder().exporter(exporter.clone()).build();
        telemetry.info("Testing Logfire logging functionality");

        let records = records(&exporter);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["message"], "Testing Logfire logging functionality");
        assert_eq!(record["service"], "mathematica_mcp");
        assert_eq!(record["target"], TELEMETRY_TARGET);
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn filters_below_the_configured_level() {
        let exporter = MemorySink::new();
        let telemetry = Telemetry::builder()
            .service_name("worker")
            .level(Severity::Warning)
            .exporter(exporter.clone())
            .build();
        telemetry.info("dropped");
        telemetry.critical("kept");

        let records = records(&exporter);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "ERROR");
        assert_eq!(records[0]["critical"], true);
        assert_eq!(records[0]["service"], "worker");
    }

    #[test]
    fn critical_level_exports_only_critical_records() {
        let exporter = MemorySink::new();
        let telemetry = Telemetry::builder()
            .level(Severity::Critical)
            .exporter(exporter.clone())
            .build();
        telemetry.error("plain error");
        telemetry.critical("meltdown");

        let records = records(&exporter);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "meltdown");
        assert_eq!(records[0]["critical"], true);
    }

    #[test]
    fn forwards_to_the_current_dispatcher_without_an_exporter() {
        let captured = MemorySink::new();
        let subscriber = Registry::default().with(fmt::layer().with_ansi(false).with_writer(captured.clone()));
        let telemetry = Telemetry::global();

        tracing::subscriber::with_default(subscriber, || {
            telemetry.debug("below the default level");
            telemetry.info("forwarded");
        });

        let lines = captured.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("telemetry: forwarded"));
        assert!(lines[0].contains("service=\"mathematica_mcp\""));
    }
}
