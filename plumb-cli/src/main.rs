use anyhow::{Context, Result};
use clap::Parser;
use plumb_logging::{
    ContextEnrichment, Fields, LambdaInvocation, Logger, LoggerConfig, StructuredLogger,
};
use std::path::Path;
use std::process::ExitCode;

mod cli;
use cli::{Cli, Commands, LogArgs};

/// Exit status for configuration that could not be loaded
const CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = plumb_logging::init_internal_tracing(&cli.internal_log) {
        eprintln!("Failed to initialize internal tracing: {e}");
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(CONFIG_ERROR);
        }
    };

    match cli.command {
        Commands::Log(args) => log_line(config, args),
    }

    ExitCode::SUCCESS
}

fn load_config(path: Option<&Path>) -> Result<LoggerConfig> {
    match path {
        Some(path) => LoggerConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load logger config from {}", path.display())),
        None => LoggerConfig::from_env().context("Failed to read PLUMB_* environment variables"),
    }
}

fn log_line(mut config: LoggerConfig, args: LogArgs) {
    if let Some(format) = args.format {
        config = config.with_log_format(format);
    }
    if let Some(threshold) = args.level_threshold {
        // Numeric strings are read as thresholds when the level is resolved
        config = config.with_level(threshold);
    }

    let mut logger = Logger::new(config);
    tracing::debug!(context_id = logger.context_id(), "Logger ready");

    if let (Some(request_id), Some(function_arn)) = (args.request_id, args.function_arn) {
        let invocation = LambdaInvocation::new(request_id, function_arn);
        logger.refresh_context(&[ContextEnrichment::invocation(&invocation)]);
    }

    let fields: Fields = args.fields.into_iter().collect();
    logger.log(args.level, &args.template, fields);
    logger.flush();
}
