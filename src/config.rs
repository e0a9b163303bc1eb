//! Configuration for the service container.
//!
//! Bootstrap code typically decides which services to register from a
//! deployment environment name and a handful of on/off feature flags. This
//! module loads those values from layered sources and binds them to the
//! container through [`ContainerConfig`].

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};
use crate::internal::DEFAULT_MAX_DEPTH;

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Parses a raw string into the narrowest matching value.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(float_val) = raw.parse::<f64>() {
            ConfigValue::Float(float_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_str(&self) -> DiResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(DiError::Config(format!("expected a string, found {other:?}"))),
        }
    }

    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(DiError::Config(format!("expected an integer, found {other:?}"))),
        }
    }

    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            other => Err(DiError::Config(format!("expected a boolean, found {other:?}"))),
        }
    }

    /// Lenient boolean used for feature flags.
    ///
    /// Accepts booleans, `0`/`1`, and the strings `on`/`off`, `yes`/`no`,
    /// `enabled`/`disabled` in any case.
    pub fn as_flag(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::Integer(0) => Ok(false),
            ConfigValue::Integer(1) => Ok(true),
            ConfigValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "enabled" => Ok(true),
                "false" | "off" | "no" | "disabled" => Ok(false),
                _ => Err(DiError::Config(format!("invalid feature flag value {s:?}"))),
            },
            other => Err(DiError::Config(format!("invalid feature flag value {other:?}"))),
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// List all available keys
    fn keys(&self) -> Vec<String>;
}

/// Environment variable configuration source
///
/// Keys are looked up upper-cased, with `.` mapped to `_` and an optional
/// `PREFIX_` in front: with prefix `app`, key `feature_cache` reads
/// `APP_FEATURE_CACHE`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into().to_uppercase()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        let key = key.replace('.', "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{key}"),
            None => key,
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key)).ok().map(|value| ConfigValue::parse(&value))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => key
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(str::to_lowercase),
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory configuration source, mostly for tests and embedded defaults.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// JSON file configuration source
///
/// The file must hold a flat JSON object. It is read lazily on first access.
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    file_path: std::path::PathBuf,
    config: RwLock<Option<HashMap<String, ConfigValue>>>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    pub fn new(file_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            config: RwLock::new(None),
        }
    }

    /// Reload configuration from file
    pub fn reload(&self) -> DiResult<()> {
        let content = std::fs::read_to_string(&self.file_path).map_err(|e| {
            DiError::Config(format!("cannot read {}: {e}", self.file_path.display()))
        })?;
        let parsed: HashMap<String, ConfigValue> = serde_json::from_str(&content)
            .map_err(|e| DiError::Config(format!("invalid JSON in {}: {e}", self.file_path.display())))?;
        *self.config.write() = Some(parsed);
        Ok(())
    }

    fn ensure_loaded(&self) {
        if self.config.read().is_some() {
            return;
        }
        if let Err(error) = self.reload() {
            tracing::warn!(%error, "configuration file could not be loaded");
        }
    }
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.ensure_loaded();
        self.config.read().as_ref()?.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.ensure_loaded();
        self.config
            .read()
            .as_ref()
            .map(|cfg| cfg.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Layered configuration: sources are consulted in the order they were added
/// and the first one holding a key wins.
pub struct ConfigProvider {
    sources: Vec<Box<dyn ConfigSource>>,
    cache: RwLock<HashMap<String, ConfigValue>>,
}

impl fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("sources", &self.sources)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl ConfigProvider {
    /// Creates a provider with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a source with lower priority than those already added.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.cache.read().get(key) {
            return Some(value.clone());
        }

        let value = self.sources.iter().find_map(|source| source.get(key))?;
        self.cache.write().insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn get_string(&self, key: &str) -> DiResult<Option<String>> {
        self.get(key).map(|v| v.as_str().map(str::to_string)).transpose()
    }

    pub fn get_i64(&self, key: &str) -> DiResult<Option<i64>> {
        self.get(key).map(|v| v.as_i64()).transpose()
    }

    pub fn get_flag(&self, key: &str) -> DiResult<Option<bool>> {
        self.get(key).map(|v| v.as_flag()).transpose()
    }

    /// Clears cached lookups so the next read goes back to the sources.
    pub fn invalidate_cache(&self) {
        self.cache.write().clear();
    }

    /// All keys from all sources, sorted and deduplicated.
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.iter().flat_map(|source| source.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new().with_source(EnvironmentConfigSource::new())
    }
}

/// Deployment environment the container was configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DiError::Config(format!("unknown environment {other:?}"))),
        }
    }
}

/// Settings bound to one [`ServiceProvider`](crate::ServiceProvider).
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{ConfigProvider, ConfigValue, ContainerConfig, Environment, MapConfigSource};
///
/// let source = MapConfigSource::new()
///     .with("environment", ConfigValue::String("prod".into()))
///     .with("feature_cache", ConfigValue::String("on".into()));
/// let config = ContainerConfig::load(&ConfigProvider::new().with_source(source)).unwrap();
///
/// assert_eq!(config.environment, Environment::Production);
/// assert!(config.is_feature_enabled("cache"));
/// assert!(!config.is_feature_enabled("metrics"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    pub environment: Environment,
    /// Named on/off switches; unknown names read as disabled
    pub features: BTreeMap<String, bool>,
    /// Longest dependency chain a single resolve may walk
    pub max_resolution_depth: usize,
}

/// Prefix of feature-flag keys.
const FEATURE_PREFIX: &str = "feature_";

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            features: BTreeMap::new(),
            max_resolution_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ContainerConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.features.insert(name.into(), enabled);
        self
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    /// Reads `environment`, `max_resolution_depth` and every `feature_<name>`
    /// key from `config`. Missing keys keep their defaults; malformed values
    /// are an error.
    pub fn load(config: &ConfigProvider) -> DiResult<Self> {
        let mut loaded = Self::default();

        if let Some(environment) = config.get_string("environment")? {
            loaded.environment = environment.parse()?;
        }

        if let Some(depth) = config.get_i64("max_resolution_depth")? {
            loaded.max_resolution_depth = usize::try_from(depth)
                .ok()
                .filter(|depth| *depth > 0)
                .ok_or_else(|| DiError::Config(format!("invalid max_resolution_depth {depth}")))?;
        }

        for key in config.all_keys() {
            let Some(name) = key.strip_prefix(FEATURE_PREFIX) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if let Some(enabled) = config.get_flag(&key)? {
                loaded.features.insert(name.to_string(), enabled);
            }
        }

        tracing::debug!(
            environment = %loaded.environment,
            features = loaded.features.len(),
            "loaded container configuration"
        );
        Ok(loaded)
    }

    /// Loads from process environment variables carrying `prefix`.
    pub fn from_env(prefix: &str) -> DiResult<Self> {
        Self::load(&ConfigProvider::new().with_source(EnvironmentConfigSource::with_prefix(prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_environment_config_source() {
        env::set_var("TEST_KEY", "test_value");
        env::set_var("TEST_INT", "42");
        env::set_var("TEST_BOOL", "true");

        let source = EnvironmentConfigSource::new();

        assert_eq!(source.get("test_key"), Some(ConfigValue::String("test_value".to_string())));
        assert_eq!(source.get("test_int"), Some(ConfigValue::Integer(42)));
        assert_eq!(source.get("test_bool"), Some(ConfigValue::Boolean(true)));

        env::remove_var("TEST_KEY");
        env::remove_var("TEST_INT");
        env::remove_var("TEST_BOOL");
    }

    #[test]
    #[serial]
    fn test_container_config_from_env_prefix() {
        env::set_var("FCTEST_ENVIRONMENT", "testing");
        env::set_var("FCTEST_FEATURE_AUDIT", "yes");
        env::set_var("FCTEST_FEATURE_CACHE", "0");

        let config = ContainerConfig::from_env("fctest").unwrap();
        assert_eq!(config.environment, Environment::Test);
        assert!(config.is_feature_enabled("audit"));
        assert!(!config.is_feature_enabled("cache"));
        assert_eq!(config.features.len(), 2);

        env::remove_var("FCTEST_ENVIRONMENT");
        env::remove_var("FCTEST_FEATURE_AUDIT");
        env::remove_var("FCTEST_FEATURE_CACHE");
    }

    #[test]
    fn test_sources_consulted_in_order() {
        let provider = ConfigProvider::new()
            .with_source(MapConfigSource::new().with("environment", ConfigValue::String("prod".into())))
            .with_source(
                MapConfigSource::new()
                    .with("environment", ConfigValue::String("dev".into()))
                    .with("max_resolution_depth", ConfigValue::Integer(16)),
            );

        let config = ContainerConfig::load(&provider).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.max_resolution_depth, 16);
        assert_eq!(provider.all_keys(), vec!["environment", "max_resolution_depth"]);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let bad_env = ConfigProvider::new()
            .with_source(MapConfigSource::new().with("environment", ConfigValue::String("staging".into())));
        assert!(matches!(ContainerConfig::load(&bad_env), Err(DiError::Config(_))));

        let bad_flag = ConfigProvider::new()
            .with_source(MapConfigSource::new().with("feature_x", ConfigValue::String("maybe".into())));
        assert!(matches!(ContainerConfig::load(&bad_flag), Err(DiError::Config(_))));

        let bad_depth = ConfigProvider::new()
            .with_source(MapConfigSource::new().with("max_resolution_depth", ConfigValue::Integer(0)));
        assert!(matches!(ContainerConfig::load(&bad_depth), Err(DiError::Config(_))));
    }

    #[test]
    fn test_environment_aliases() {
        assert_eq!("DEV".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!(" prod ".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(Environment::Test.to_string(), "test");
    }

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::load(&ConfigProvider::new()).unwrap();
        assert_eq!(config, ContainerConfig::default());
        assert_eq!(config.max_resolution_depth, DEFAULT_MAX_DEPTH);
    }
}
