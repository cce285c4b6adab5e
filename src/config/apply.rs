use clap::ArgMatches;
use clap::parser::ValueSource;
use url::Url;

use crate::args::{PositiveU64, PositiveUsize, PullArgs};
use crate::error::{AppError, AppResult, ConfigError};
use crate::registry::{RegistryCatalog, RegistryDescriptor};

use super::types::{ConfigFile, RegistryConfig};

/// Applies configuration values to CLI arguments. Flags given on the command
/// line keep their values.
///
/// # Errors
///
/// Returns an error when a config value is out of range.
pub fn apply_config(args: &mut PullArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if !is_cli(matches, "image")
        && let Some(image) = config.image.clone()
    {
        args.image = Some(image);
    }

    if !is_cli(matches, "pulls")
        && let Some(pulls) = config.pulls
    {
        args.pulls = ensure_positive_u64(pulls, "pulls")?;
    }

    if !is_cli(matches, "registry")
        && let Some(registry) = config.registry.clone()
    {
        args.registry = registry;
    }

    if !is_cli(matches, "delay_ms")
        && let Some(delay) = config.delay
    {
        args.delay_ms = delay;
    }

    if !is_cli(matches, "jitter")
        && let Some(jitter) = config.jitter.as_ref()
    {
        args.jitter = jitter.to_jitter().map_err(|err| {
            AppError::config(ConfigError::InvalidField {
                field: "jitter".to_owned(),
                source: err,
            })
        })?;
    }

    if !is_cli(matches, "concurrent")
        && let Some(concurrent) = config.concurrent
    {
        args.concurrent = ensure_positive_usize(concurrent, "concurrent")?;
    }

    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.request_timeout = timeout.to_duration()?;
    }

    if !is_cli(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = timeout.to_duration()?;
    }

    if !is_cli(matches, "log_every")
        && let Some(log_every) = config.log_every
    {
        args.log_every = ensure_positive_u64(log_every, "log_every")?;
    }

    if !is_cli(matches, "no_color")
        && let Some(no_color) = config.no_color
    {
        args.no_color = no_color;
    }

    Ok(())
}

/// Built-in registries plus any defined in the config file.
///
/// # Errors
///
/// Returns an error when a configured registry has an invalid URL or shadows
/// a built-in one.
pub fn build_catalog(config: Option<&ConfigFile>) -> AppResult<RegistryCatalog> {
    let mut catalog = RegistryCatalog::builtin();
    let Some(registries) = config.and_then(|config| config.registries.as_ref()) else {
        return Ok(catalog);
    };
    for (key, entry) in registries {
        let descriptor = descriptor_from_config(key, entry)?;
        catalog.insert(key, descriptor)?;
    }
    Ok(catalog)
}

fn descriptor_from_config(key: &str, entry: &RegistryConfig) -> AppResult<RegistryDescriptor> {
    let parse = |field: &'static str, value: &str| {
        Url::parse(value).map_err(|err| {
            AppError::config(ConfigError::InvalidRegistryUrl {
                key: key.to_owned(),
                field,
                value: value.to_owned(),
                source: err,
            })
        })
    };
    Ok(RegistryDescriptor {
        name: entry.name.clone().unwrap_or_else(|| key.to_owned()),
        token_endpoint: parse("auth_url", &entry.auth_url)?,
        pull_endpoint: parse("registry_url", &entry.registry_url)?,
        service: entry.service.clone(),
        normalization: entry.normalization,
    })
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}
