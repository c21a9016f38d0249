use std::{
    fs,
    path::Path,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::CartResult,
    reconnect::{ReconnectPolicy, DEFAULT_MAX_RECONNECT_DELAY, DEFAULT_RECONNECT_DELAY},
    remote::{CartEndpoints, RemoteCartProvider, DEFAULT_CART_ID},
    synthetic::{SyntheticCartProvider, SyntheticSettings},
    CartProvider,
};

pub const DEFAULT_SETTINGS_FILE: &str = "zcart.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectStrategy {
    #[default]
    Fixed,
    Exponential,
}

impl FromStr for ReconnectStrategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => bail!("unknown reconnect strategy {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSettings {
    pub strategy: ReconnectStrategy,
    pub delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            delay: DEFAULT_RECONNECT_DELAY,
            max_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        match self.strategy {
            ReconnectStrategy::Fixed => ReconnectPolicy::Fixed {
                delay: self.delay,
                max_attempts: self.max_attempts,
            },
            ReconnectStrategy::Exponential => ReconnectPolicy::Exponential {
                initial: self.delay,
                max: self.max_delay,
                max_attempts: self.max_attempts,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Cart service base URL. Absent selects the synthetic provider.
    pub base_url: Option<String>,
    pub cart_id: String,
    pub synthetic: SyntheticSettings,
    pub reconnect: ReconnectSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            cart_id: DEFAULT_CART_ID.into(),
            synthetic: SyntheticSettings::default(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Remote { base_url: String },
    Synthetic,
}

impl Settings {
    pub fn provider_kind(&self) -> ProviderKind {
        match self.base_url.as_deref().map(str::trim) {
            Some(base_url) if !base_url.is_empty() => ProviderKind::Remote {
                base_url: base_url.to_string(),
            },
            _ => ProviderKind::Synthetic,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    base_url: Option<String>,
    cart_id: Option<String>,
    #[serde(default)]
    synthetic: FileSynthetic,
    #[serde(default)]
    reconnect: FileReconnect,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSynthetic {
    delay_ms: Option<u64>,
    interval_ms: Option<u64>,
    max_quantity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileReconnect {
    strategy: Option<ReconnectStrategy>,
    delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
}

/// Defaults, then `path` (or `zcart.toml` in the working directory when it
/// exists), then environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_SETTINGS_FILE).ok(),
    };
    if let Some(raw) = raw {
        let file_cfg: FileSettings = toml::from_str(&raw).with_context(|| {
            format!(
                "failed to parse settings file '{}'",
                path.map_or_else(|| DEFAULT_SETTINGS_FILE.into(), |p| p.display().to_string())
            )
        })?;
        apply_file(&mut settings, file_cfg);
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.base_url {
        settings.base_url = Some(v);
    }
    if let Some(v) = file_cfg.cart_id {
        settings.cart_id = v;
    }

    if let Some(v) = file_cfg.synthetic.delay_ms {
        settings.synthetic.delay = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.synthetic.interval_ms {
        settings.synthetic.interval = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.synthetic.max_quantity {
        settings.synthetic.max_quantity = v;
    }

    if let Some(v) = file_cfg.reconnect.strategy {
        settings.reconnect.strategy = v;
    }
    if let Some(v) = file_cfg.reconnect.delay_ms {
        settings.reconnect.delay = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.reconnect.max_delay_ms {
        settings.reconnect.max_delay = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.reconnect.max_attempts {
        settings.reconnect.max_attempts = Some(v);
    }
}

/// Unparseable values are ignored and leave the previous layer in place.
fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(v) = lookup("ZCART_BASE_URL") {
        settings.base_url = Some(v);
    }
    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = Some(v);
    }

    if let Some(v) = lookup("ZCART_CART_ID") {
        settings.cart_id = v;
    }
    if let Some(v) = lookup("APP__CART_ID") {
        settings.cart_id = v;
    }

    if let Some(v) = parsed("ZCART_SYNTHETIC_DELAY_MS") {
        settings.synthetic.delay = Duration::from_millis(v);
    }
    if let Some(v) = parsed("ZCART_SYNTHETIC_INTERVAL_MS") {
        settings.synthetic.interval = Duration::from_millis(v);
    }
    if let Some(v) = parsed("ZCART_SYNTHETIC_MAX_QUANTITY").and_then(|v| u32::try_from(v).ok()) {
        settings.synthetic.max_quantity = v;
    }

    if let Some(v) = lookup("ZCART_RECONNECT_STRATEGY").and_then(|v| v.parse::<ReconnectStrategy>().ok()) {
        settings.reconnect.strategy = v;
    }
    if let Some(v) = parsed("ZCART_RECONNECT_DELAY_MS") {
        settings.reconnect.delay = Duration::from_millis(v);
    }
    if let Some(v) = parsed("ZCART_RECONNECT_MAX_DELAY_MS") {
        settings.reconnect.max_delay = Duration::from_millis(v);
    }
    if let Some(v) = parsed("ZCART_RECONNECT_MAX_ATTEMPTS").and_then(|v| u32::try_from(v).ok()) {
        settings.reconnect.max_attempts = Some(v);
    }
}

/// Picks the provider for `settings`. Must run inside a Tokio runtime.
pub fn provider_from_settings(settings: &Settings) -> CartResult<Arc<dyn CartProvider>> {
    match settings.provider_kind() {
        ProviderKind::Remote { base_url } => {
            let endpoints = CartEndpoints::new(&base_url, settings.cart_id.clone())?;
            info!(
                %base_url,
                cart_id = %settings.cart_id,
                "using remote cart provider"
            );
            Ok(Arc::new(RemoteCartProvider::new(
                endpoints,
                settings.reconnect.policy(),
            )))
        }
        ProviderKind::Synthetic => {
            info!("no cart service configured, using synthetic cart provider");
            Ok(Arc::new(SyntheticCartProvider::new(
                settings.synthetic.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use backoff::backoff::Backoff;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn temp_settings_file(contents: &str) -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("zcart_settings_test_{suffix}.toml"));
        fs::write(&path, contents).expect("write settings");
        path
    }

    #[test]
    fn defaults_select_synthetic_provider() {
        let settings = Settings::default();
        assert_eq!(settings.cart_id, "2");
        assert_eq!(settings.synthetic.delay, Duration::from_millis(2000));
        assert_eq!(settings.synthetic.interval, Duration::from_millis(60_000));
        assert_eq!(settings.synthetic.max_quantity, 4);
        assert_eq!(settings.reconnect.policy(), ReconnectPolicy::default());
        assert_eq!(settings.provider_kind(), ProviderKind::Synthetic);
    }

    #[test]
    fn blank_base_url_counts_as_absent() {
        let settings = Settings {
            base_url: Some("   ".into()),
            ..Settings::default()
        };
        assert_eq!(settings.provider_kind(), ProviderKind::Synthetic);
    }

    #[test]
    fn env_overrides_and_app_prefix_wins() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("ZCART_BASE_URL", "http://cart.local"),
                ("APP__BASE_URL", "http://cart.internal:8080"),
                ("ZCART_CART_ID", "9"),
                ("ZCART_SYNTHETIC_DELAY_MS", "0"),
                ("ZCART_RECONNECT_STRATEGY", "Exponential"),
                ("ZCART_RECONNECT_MAX_ATTEMPTS", "5"),
            ]),
        );

        assert_eq!(
            settings.provider_kind(),
            ProviderKind::Remote {
                base_url: "http://cart.internal:8080".into()
            }
        );
        assert_eq!(settings.cart_id, "9");
        assert_eq!(settings.synthetic.delay, Duration::ZERO);
        assert_eq!(
            settings.reconnect.policy(),
            ReconnectPolicy::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
                max_attempts: Some(5),
            }
        );
    }

    #[test]
    fn unparseable_env_values_are_ignored() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("ZCART_SYNTHETIC_INTERVAL_MS", "soon"),
                ("ZCART_SYNTHETIC_MAX_QUANTITY", "-3"),
                ("ZCART_RECONNECT_STRATEGY", "linear"),
            ]),
        );
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn zero_reconnect_delay_does_not_spin() {
        let mut settings = Settings::default();
        apply_env(&mut settings, env_from(&[("ZCART_RECONNECT_DELAY_MS", "0")]));
        assert_eq!(settings.reconnect.delay, Duration::ZERO);

        let mut backoff = settings.reconnect.policy().backoff();
        assert_eq!(
            backoff.next_backoff(),
            Some(crate::reconnect::MIN_RECONNECT_DELAY)
        );
    }

    #[test]
    fn settings_file_layers_under_env() {
        let path = temp_settings_file(
            r#"
base_url = "https://cart.example.com/api"
cart_id = "41"

[synthetic]
delay_ms = 10

[reconnect]
strategy = "exponential"
delay_ms = 250
max_delay_ms = 4000
"#,
        );

        let raw = fs::read_to_string(&path).expect("read back");
        let mut settings = Settings::default();
        apply_file(&mut settings, toml::from_str(&raw).expect("parse"));
        apply_env(&mut settings, env_from(&[("ZCART_CART_ID", "42")]));
        fs::remove_file(&path).expect("cleanup");

        assert_eq!(
            settings.base_url.as_deref(),
            Some("https://cart.example.com/api")
        );
        assert_eq!(settings.cart_id, "42");
        assert_eq!(settings.synthetic.delay, Duration::from_millis(10));
        assert_eq!(settings.synthetic.interval, Duration::from_millis(60_000));
        assert_eq!(
            settings.reconnect.policy(),
            ReconnectPolicy::Exponential {
                initial: Duration::from_millis(250),
                max: Duration::from_millis(4000),
                max_attempts: None,
            }
        );
    }

    #[test]
    fn missing_explicit_settings_file_is_an_error() {
        let path = env::temp_dir().join("zcart_settings_test_does_not_exist.toml");
        let err = load_settings(Some(&path)).expect_err("should fail");
        assert!(err.to_string().contains("failed to read settings file"));
    }

    #[test]
    fn unknown_settings_keys_are_rejected() {
        let path = temp_settings_file("base_urll = \"http://typo\"\n");
        let err = load_settings(Some(&path)).expect_err("should fail");
        fs::remove_file(&path).expect("cleanup");
        assert!(err.to_string().contains("failed to parse settings file"));
    }

    #[tokio::test]
    async fn factory_rejects_non_http_base_url() {
        let settings = Settings {
            base_url: Some("ftp://cart.example.com".into()),
            ..Settings::default()
        };
        assert!(provider_from_settings(&settings).is_err());
    }

    #[tokio::test]
    async fn factory_builds_synthetic_provider_without_base_url() {
        let settings = Settings {
            synthetic: SyntheticSettings {
                delay: Duration::ZERO,
                ..SyntheticSettings::default()
            },
            ..Settings::default()
        };
        let provider = provider_from_settings(&settings).expect("provider");
        let items = provider.list_cart_items().await.expect("items");
        assert!(!items.is_empty());
    }
}
