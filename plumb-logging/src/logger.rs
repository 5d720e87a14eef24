use crate::config::{ExecutionEnvironment, LoggerConfig, ResolvedConfig};
use crate::context::{BaseContext, ContextStore};
use crate::enrichment::{
    ContainerMetadataEnricher, ContextEnrichment, Enricher, HttpMetadataClient, LambdaEnvironment,
    LambdaEnvironmentEnricher, MetadataClient, SettingsCache,
};
use crate::error::{render_error_chain, Diagnostic};
use crate::event::LogEvent;
use crate::sinks::{ConsoleSink, LogSink};
use crate::template;
use plumb_interfaces::{Fields, LogLevel, StructuredLogger};
use serde::Serialize;
use std::error::Error as StdError;
use std::io::Write;

/// Context-aware structured logger.
///
/// Each call renders its template against the supplied fields, merges the
/// current context and writes one line. Anything that goes wrong along the
/// way becomes an extra `Exception(Logger): ...` line written first.
pub struct Logger {
    config: ResolvedConfig,
    store: ContextStore,
    sink: Box<dyn LogSink>,
    metadata_client: Box<dyn MetadataClient>,
    lambda_environment: SettingsCache<LambdaEnvironment>,
}

impl Logger {
    /// Build a logger writing to standard output
    pub fn new(config: LoggerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    pub fn level(&self) -> LogLevel {
        self.config.level
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Correlation id shared by every line until the next refresh
    pub fn context_id(&self) -> &str {
        self.store.context_id()
    }

    /// Start a new context.
    ///
    /// Dynamic fields are dropped and a new `context_id` issued. The
    /// execution environment's own metadata is gathered again, then each
    /// requested enrichment runs in order.
    pub fn refresh_context(&mut self, enrichments: &[ContextEnrichment<'_>]) {
        self.store.reset();

        let environment = environment_enricher(
            self.config.environment,
            &*self.metadata_client,
            &self.lambda_environment,
        );
        let requested: Vec<Box<dyn Enricher + '_>> =
            enrichments.iter().map(ContextEnrichment::enricher).collect();

        let enrichers: Vec<&dyn Enricher> = environment
            .iter()
            .chain(requested.iter())
            .map(|enricher| &**enricher)
            .collect();
        let diagnostics = self.store.apply(&enrichers);

        self.write_diagnostics(&diagnostics);
    }

    /// Add or replace a field on every following line until the next refresh
    pub fn set_context_field(&mut self, key: impl Into<String>, value: impl Serialize) {
        self.store.set_field(key, value);
    }

    /// Forget the cached serverless environment so the next refresh rereads it
    pub fn invalidate_environment_cache(&self) {
        self.lambda_environment.invalidate();
    }

    pub fn flush(&self) {
        self.sink.flush();
    }

    fn dispatch(&self, level: LogLevel, template: &str, fields: &Fields, exception: Option<String>) {
        if !level.should_log(self.config.level) {
            return;
        }

        let (snapshot, mut diagnostics) = self.store.snapshot();
        let rendered = template::render(template, fields);
        diagnostics.extend(rendered.diagnostics);

        let context = snapshot.merged();
        let mut events: Vec<LogEvent> = diagnostics
            .iter()
            .map(|diagnostic| diagnostic.to_event(context.clone()))
            .collect();

        // Precedence, lowest first: dynamic context, call fields, base context
        let mut event = LogEvent::new(level, rendered.message)
            .with_template(template)
            .with_fields(snapshot.dynamic)
            .with_fields(rendered.fields)
            .with_fields(snapshot.base);
        if let Some(exception) = exception {
            event = event.with_exception(exception);
        }

        // Diagnostics and the line they belong to go out together
        events.push(event);
        self.sink.log_all(&events);
    }

    fn write_diagnostics(&self, diagnostics: &[Diagnostic]) {
        if diagnostics.is_empty() {
            return;
        }

        // Fields that fail here are dropped silently; the next call reports them
        let (snapshot, _) = self.store.snapshot();
        let context = snapshot.merged();

        let events: Vec<LogEvent> = diagnostics
            .iter()
            .map(|diagnostic| diagnostic.to_event(context.clone()))
            .collect();
        self.sink.log_all(&events);
    }
}

fn environment_enricher<'a>(
    environment: ExecutionEnvironment,
    metadata_client: &'a dyn MetadataClient,
    lambda_environment: &'a SettingsCache<LambdaEnvironment>,
) -> Option<Box<dyn Enricher + 'a>> {
    match environment {
        ExecutionEnvironment::Fargate => Some(Box::new(ContainerMetadataEnricher::new(metadata_client))),
        ExecutionEnvironment::Lambda => Some(Box::new(LambdaEnvironmentEnricher::new(lambda_environment))),
        ExecutionEnvironment::Local => None,
    }
}

impl StructuredLogger for Logger {
    fn log(&self, level: LogLevel, template: &str, fields: Fields) {
        self.dispatch(level, template, &fields, None);
    }

    fn log_exception(&self, template: &str, error: &(dyn StdError + 'static), fields: Fields) {
        self.dispatch(LogLevel::Error, template, &fields, Some(render_error_chain(error)));
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level.should_log(self.config.level)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config)
            .field("context_id", &self.store.context_id())
            .finish_non_exhaustive()
    }
}

/// Builder for creating loggers
pub struct LoggerBuilder {
    config: LoggerConfig,
    sink: Option<Box<dyn LogSink>>,
    writer: Option<Box<dyn Write + Send>>,
    metadata_client: Option<Box<dyn MetadataClient>>,
}

impl LoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            sink: None,
            writer: None,
            metadata_client: None,
        }
    }

    /// Write lines to `writer` instead of standard output
    pub fn writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Replace the output sink entirely; takes priority over [`writer`](Self::writer)
    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Transport used to read container metadata
    pub fn metadata_client(mut self, client: impl MetadataClient + 'static) -> Self {
        self.metadata_client = Some(Box::new(client));
        self
    }

    /// Settle the configuration, write any configuration warnings and
    /// gather the execution environment's metadata.
    pub fn build(self) -> Logger {
        let (config, config_diagnostics) = self.config.resolve();

        let sink: Box<dyn LogSink> = match (self.sink, self.writer) {
            (Some(sink), _) => sink,
            (None, Some(writer)) => Box::new(ConsoleSink::new(config.format, writer)),
            (None, None) => Box::new(ConsoleSink::stdout(config.format)),
        };
        let metadata_client = self
            .metadata_client
            .unwrap_or_else(|| Box::new(HttpMetadataClient::new(config.metadata_timeout)));

        let mut logger = Logger {
            config,
            store: ContextStore::new(BaseContext::from_env(config.ship_logs)),
            sink,
            metadata_client,
            lambda_environment: SettingsCache::new(),
        };

        // Written regardless of the level threshold
        logger.write_diagnostics(&config_diagnostics);

        tracing::debug!(
            level = %logger.config.level,
            environment = %logger.config.environment,
            format = %logger.config.format,
            "Logger configured"
        );

        if logger.config.environment != ExecutionEnvironment::Local {
            logger.refresh_context(&[]);
        }

        logger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::enrichment::container::MockMetadataClient;
    use crate::sinks::MemoryWriter;
    use plumb_interfaces::fields;

    fn capture(config: LoggerConfig) -> (Logger, MemoryWriter) {
        let output = MemoryWriter::new();
        let logger = Logger::builder(config).writer(output.clone()).build();
        (logger, output)
    }

    #[test]
    fn test_filtered_call_writes_nothing() {
        let (logger, output) = capture(LoggerConfig::new().with_level(LogLevel::Error));

        logger.info("ignored {missing}", Fields::new());

        assert!(output.contents().is_empty());
    }

    #[test]
    fn test_kwargs_cannot_override_base_context() {
        let (logger, output) = capture(LoggerConfig::new());

        logger.info("hi", fields!(context_id = "mine", extra = 1));

        let line = &output.json_lines()[0];
        assert_eq!(line["context_id"], logger.context_id());
        assert_eq!(line["extra"], 1);
    }

    #[test]
    fn test_kwargs_override_dynamic_context() {
        let (mut logger, output) = capture(LoggerConfig::new());
        logger.set_context_field("user", "from-context");

        logger.info("hi", fields!(user = "from-call"));

        assert_eq!(output.json_lines()[0]["user"], "from-call");
    }

    #[test]
    fn test_local_logger_never_touches_metadata() {
        let mut client = MockMetadataClient::new();
        client.expect_fetch().never();
        let output = MemoryWriter::new();

        let mut logger = Logger::builder(LoggerConfig::new())
            .writer(output.clone())
            .metadata_client(client)
            .build();
        logger.refresh_context(&[]);

        assert!(output.contents().is_empty());
    }

    #[test]
    fn test_config_warning_ignores_threshold() {
        let (_logger, output) = capture(
            LoggerConfig::new()
                .with_level(LogLevel::Error)
                .with_log_format(LogFormat::Text),
        );

        let lines = output.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[WARNING]"));
        assert!(lines[0].contains("Disabling log shipping"));
    }

    #[derive(Clone, Default)]
    struct BatchRecorder {
        batches: std::sync::Arc<std::sync::Mutex<Vec<Vec<String>>>>,
    }

    impl LogSink for BatchRecorder {
        fn log_all(&self, events: &[LogEvent]) {
            let messages = events.iter().map(|event| event.message.clone()).collect();
            self.batches.lock().unwrap().push(messages);
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_diagnostic_travels_with_its_line() {
        let recorder = BatchRecorder::default();
        let logger = Logger::builder(LoggerConfig::new())
            .sink(recorder.clone())
            .build();

        logger.info("hello {nobody}", Fields::new());
        logger.info("plain", Fields::new());

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[0],
            vec![template::interpolation_failed_message(), "hello {nobody}".to_string()]
        );
        assert_eq!(batches[1], vec!["plain".to_string()]);
    }
}
