use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::args::{JitterPercent, parse_duration_arg, parse_jitter};
use crate::error::{AppResult, ValidationError};
use crate::registry::Normalization;

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub image: Option<String>,
    pub pulls: Option<u64>,
    pub registry: Option<String>,
    #[serde(alias = "delay_ms")]
    pub delay: Option<u64>,
    pub jitter: Option<JitterValue>,
    #[serde(alias = "concurrency")]
    pub concurrent: Option<usize>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub log_every: Option<u64>,
    pub no_color: Option<bool>,
    pub registries: Option<BTreeMap<String, RegistryConfig>>,
}

/// A registry added under `[registries.<key>]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub name: Option<String>,
    pub auth_url: String,
    pub registry_url: String,
    pub service: String,
    #[serde(default)]
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> AppResult<Duration> {
        match self {
            DurationValue::Seconds(secs) => parse_duration_arg(&secs.to_string()),
            DurationValue::Text(text) => parse_duration_arg(text),
        }
    }
}

/// Jitter may be written as `25`, `12.5` or `"12.5"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JitterValue {
    Whole(u64),
    Fractional(f64),
    Text(String),
}

impl JitterValue {
    pub(crate) fn to_jitter(&self) -> Result<JitterPercent, ValidationError> {
        match self {
            JitterValue::Whole(value) => parse_jitter(&value.to_string()),
            JitterValue::Fractional(value) => parse_jitter(&value.to_string()),
            JitterValue::Text(text) => parse_jitter(text),
        }
    }
}
