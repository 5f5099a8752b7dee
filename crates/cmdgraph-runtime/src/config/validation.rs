//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, CmdGraphConfig, LogOutput, LoggingConfig, SchedulerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CmdGraphConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_bot_config(&config.bot)?;
    validate_scheduler_config(&config.scheduler)?;

    if config.storage.path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("storage.path"));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.session.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.session"));
    }
    Ok(())
}

fn validate_scheduler_config(scheduler: &SchedulerConfig) -> ConfigResult<()> {
    if scheduler.interval_secs == 0 {
        return Err(ConfigError::validation(
            "Scheduler interval must be greater than 0",
        ));
    }

    if scheduler.retry_delay_secs == 0 {
        return Err(ConfigError::validation(
            "Scheduler retry delay must be greater than 0",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CmdGraphConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_session() {
        let mut config = CmdGraphConfig::default();
        config.bot.session = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = CmdGraphConfig::default();
        config.scheduler.interval_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = CmdGraphConfig::default();
        config.scheduler.retry_delay_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = CmdGraphConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("cmdgraph.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
