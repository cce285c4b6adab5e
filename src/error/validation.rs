use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Image name is required (set --image or provide in config).")]
    MissingImage,
    #[error("Image name must not be empty.")]
    EmptyImage,
    #[error("Invalid image reference '{value}'.")]
    InvalidImage { value: String },
    #[error("Unsupported registry '{name}'. Supported registries: {supported}")]
    UnknownRegistry { name: String, supported: String },
    #[error("Jitter must be between 0.0 and 100.0 (got '{value}').")]
    JitterOutOfRange { value: String },
    #[error("Invalid jitter '{value}'. Expected a number such as 12.5.")]
    InvalidJitter { value: String },
    #[error("Invalid boolean '{value}'. Expected true/false, yes/no, on/off, or 1/0.")]
    InvalidBoolean { value: String },
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
}
