//! Configuration for the chat controller and its backends.
//!
//! Values are resolved in layers: built-in defaults, then an optional YAML
//! file, then `STREAMCHAT_*` environment variables, then command-line flags
//! parsed with `arrrg`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default request path appended to the base URL.
pub const DEFAULT_PATH: &str = "/chat";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "default";

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature.
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default HTTP timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable naming a YAML configuration file.
pub const ENV_CONFIG: &str = "STREAMCHAT_CONFIG";
/// Environment variable overriding the base URL.
pub const ENV_BASE_URL: &str = "STREAMCHAT_BASE_URL";
/// Environment variable carrying the API credential.
pub const ENV_API_KEY: &str = "STREAMCHAT_API_KEY";
/// Environment variable overriding the model.
pub const ENV_MODEL: &str = "STREAMCHAT_MODEL";
/// Environment variable selecting `development` or `production`.
pub const ENV_ENVIRONMENT: &str = "STREAMCHAT_ENV";

/// Deployment environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Serve replies from the local canned-response generator.
    Development,
    /// Call the configured backend.
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(Error::config(
                format!("unknown environment {other:?}; expected development or production"),
                Some("environment".to_string()),
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Command-line arguments for the streamchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "FILE")]
    pub config: Option<String>,

    /// Backend base URL.
    #[arrrg(optional, "Backend base URL (default: http://localhost:3000)", "URL")]
    pub base_url: Option<String>,

    /// Model to request.
    #[arrrg(optional, "Model identifier", "MODEL")]
    pub model: Option<String>,

    /// Deployment environment.
    #[arrrg(optional, "development or production (default: production)", "ENV")]
    pub environment: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 1024)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature, kept as text so the struct stays `Eq`.
    #[arrrg(optional, "Sampling temperature (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Settings that may appear in a YAML configuration file.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Backend base URL.
    pub base_url: Option<String>,
    /// Request path.
    pub path: Option<String>,
    /// API credential.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: Option<String>,
    /// Deployment environment.
    pub environment: Option<Environment>,
    /// Maximum tokens per response.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Parses a configuration file from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        Self::from_yaml(&yaml)
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Backend base URL.
    pub base_url: String,

    /// Request path joined onto the base URL.
    pub path: String,

    /// API credential sent as a bearer token, if any.
    pub api_key: Option<String>,

    /// Model identifier.
    pub model: String,

    /// Deployment environment.
    pub environment: Environment,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// HTTP timeout.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl Config {
    /// Creates a new Config with default values.
    ///
    /// Defaults:
    /// - Base URL: http://localhost:3000, path /chat
    /// - Model: default
    /// - Environment: production
    /// - Max tokens: 1024
    /// - Temperature: 0.7
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: DEFAULT_PATH.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            environment: Environment::Production,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
        }
    }

    /// Resolves configuration from flags and the process environment.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    /// Resolves configuration from flags and an explicit variable lookup.
    pub fn resolve_with(args: ChatArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new();

        let file = args.config.clone().or_else(|| env(ENV_CONFIG));
        if let Some(file) = file {
            config.apply_file(ConfigFile::load(&file)?);
        }

        if let Some(base_url) = env(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(api_key) = env(ENV_API_KEY) {
            config.api_key = Some(api_key);
        }
        if let Some(model) = env(ENV_MODEL) {
            config.model = model;
        }
        if let Some(environment) = env(ENV_ENVIRONMENT) {
            config.environment = environment.parse()?;
        }

        config.apply_args(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays the values present in a configuration file.
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(path) = file.path {
            self.path = path;
        }
        if let Some(api_key) = file.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(environment) = file.environment {
            self.environment = environment;
        }
        if let Some(max_tokens) = file.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = file.temperature {
            self.temperature = temperature;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
    }

    fn apply_args(&mut self, args: ChatArgs) -> Result<()> {
        if let Some(base_url) = args.base_url {
            self.base_url = base_url;
        }
        if let Some(model) = args.model {
            self.model = model;
        }
        if let Some(environment) = args.environment {
            self.environment = environment.parse()?;
        }
        if let Some(max_tokens) = args.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = args.temperature {
            self.temperature = parse_temperature(&temperature)?;
        }
        if args.no_color {
            self.use_color = false;
        }
        Ok(())
    }

    /// Checks that generation parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::config(
                "max_tokens must be positive",
                Some("max_tokens".to_string()),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(
                format!("temperature {} is outside 0.0..=2.0", self.temperature),
                Some("temperature".to_string()),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty", Some("model".to_string())));
        }
        Ok(())
    }

    /// Returns true when replies come from the canned generator.
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API credential.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the deployment environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a temperature given as text.
pub fn parse_temperature(value: &str) -> Result<f32> {
    value.trim().parse::<f32>().map_err(|_| {
        Error::config(
            format!("temperature {value:?} is not a number"),
            Some("temperature".to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.path, "/chat");
        assert_eq!(config.model, "default");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.7);
        assert!(config.api_key.is_none());
        assert!(config.use_color);
        assert!(!config.is_development());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = Config::resolve_with(ChatArgs::default(), no_env).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            base_url: Some("http://backend:8080".to_string()),
            model: Some("mistral".to_string()),
            environment: Some("development".to_string()),
            max_tokens: Some(512),
            temperature: Some("0.2".to_string()),
            no_color: true,
            ..ChatArgs::default()
        };
        let config = Config::resolve_with(args, no_env).unwrap();
        assert_eq!(config.base_url, "http://backend:8080");
        assert_eq!(config.model, "mistral");
        assert!(config.is_development());
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.temperature, 0.2);
        assert!(!config.use_color);
    }

    #[test]
    fn flags_override_environment() {
        let vars: HashMap<&str, &str> = [
            (ENV_BASE_URL, "http://from-env"),
            (ENV_API_KEY, "sk-env"),
            (ENV_MODEL, "env-model"),
            (ENV_ENVIRONMENT, "dev"),
        ]
        .into_iter()
        .collect();
        let args = ChatArgs {
            model: Some("flag-model".to_string()),
            ..ChatArgs::default()
        };
        let config =
            Config::resolve_with(args, |key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "http://from-env");
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.model, "flag-model");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn yaml_file_overlay() {
        let file = ConfigFile::from_yaml(
            "base_url: https://api.example.com\npath: /v1/stream\nenvironment: development\ntemperature: 1.1\ntimeout_secs: 5\n",
        )
        .unwrap();
        let mut config = Config::new();
        config.apply_file(file);
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.path, "/v1/stream");
        assert!(config.is_development());
        assert_eq!(config.temperature, 1.1);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        assert!(ConfigFile::from_yaml("colour: blue\n").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let args = ChatArgs {
            config: Some("/nonexistent/streamchat.yaml".to_string()),
            ..ChatArgs::default()
        };
        let err = Config::resolve_with(args, no_env).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let args = ChatArgs {
            temperature: Some("warm".to_string()),
            ..ChatArgs::default()
        };
        assert!(Config::resolve_with(args, no_env).unwrap_err().is_config());

        let args = ChatArgs {
            environment: Some("staging".to_string()),
            ..ChatArgs::default()
        };
        assert!(Config::resolve_with(args, no_env).unwrap_err().is_config());

        assert!(Config::new().with_max_tokens(0).validate().is_err());
        assert!(Config::new().with_temperature(3.5).validate().is_err());
    }

    #[test]
    fn environment_round_trips_through_display() {
        for env in [Environment::Development, Environment::Production] {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }

    #[test]
    fn config_builder_pattern() {
        let config = Config::new()
            .with_base_url("http://other")
            .with_api_key(Some("sk".to_string()))
            .with_model("m")
            .with_environment(Environment::Development)
            .with_max_tokens(64)
            .with_temperature(0.0)
            .with_timeout(Duration::from_secs(1))
            .without_color();
        assert_eq!(config.base_url, "http://other");
        assert_eq!(config.api_key.as_deref(), Some("sk"));
        assert_eq!(config.model, "m");
        assert!(config.is_development());
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert!(!config.use_color);
        assert!(config.validate().is_ok());
    }
}
