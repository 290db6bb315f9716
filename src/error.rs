//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ResolveError: Issues with version strings and constraints
//! - RegistryError: Issues with package registry communication
//! - IntegrationError: Issues while detecting, planning or applying a manifest
//! - ConfigError: Issues with the repository configuration file
//! - ScheduleError: Issues with the update schedule

use std::path::PathBuf;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Version resolution errors
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Package registry related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Integration related errors
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Schedule related errors
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Errors raised while parsing versions or constraints
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The current version of a dependency is not valid semver
    #[error("invalid current version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    /// A constraint string could not be turned into a range
    #[error("invalid constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },
}

/// Errors related to package registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    /// No datasource registered under the requested name
    #[error("no datasource registered as '{name}'")]
    UnknownDatasource { name: String },
}

/// Errors raised by ecosystem integrations
#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Failed to read a manifest or repository directory
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a manifest
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest content could not be parsed
    #[error("failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    /// A datasource lookup failed for the whole manifest
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Resolver failure that aborts the manifest
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A native command exited unsuccessfully or could not be spawned
    #[error("command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// The operation was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing error
    #[error("failed to parse YAML in {path}: {message}")]
    YamlParseError { path: PathBuf, message: String },

    /// TOML parsing error
    #[error("failed to parse TOML in {path}: {message}")]
    TomlParseError { path: PathBuf, message: String },

    /// Unsupported configuration file extension
    #[error("unsupported config format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// A value is present but unusable
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors related to update schedules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Timezone name is not a known IANA zone
    #[error("invalid timezone '{timezone}'")]
    InvalidTimezone { timezone: String },
}

impl ResolveError {
    /// Creates a new InvalidVersion error
    pub fn invalid_version(version: impl Into<String>, message: impl Into<String>) -> Self {
        ResolveError::InvalidVersion {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidConstraint error
    pub fn invalid_constraint(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        ResolveError::InvalidConstraint {
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidResponse error
    pub fn invalid_response(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::InvalidResponse {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new RateLimitExceeded error
    pub fn rate_limit_exceeded(registry: impl Into<String>) -> Self {
        RegistryError::RateLimitExceeded {
            registry: registry.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }
}

impl IntegrationError {
    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IntegrationError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new WriteError
    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IntegrationError::WriteError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new ParseError
    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        IntegrationError::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new CommandFailed error
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        IntegrationError::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Creates a new InvalidValue error
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
