use docsession_core::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration for a document session.
///
/// Usually embedded as JSON in the add-in's settings file. All fields use
/// sensible defaults if not specified.
///
/// # Examples
///
/// ```
/// use docsession::config::SessionConfig;
///
/// let json = r#"{
///     "closing_check": { "delay_ms": 350 },
///     "save_deferral": { "save_as": false }
/// }"#;
///
/// let config = SessionConfig::from_json(json).unwrap();
/// assert_eq!(config.closing_check.delay_ms, 350);
/// assert!(config.save_deferral.save);
/// assert!(!config.save_deferral.save_as);
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub closing_check: ClosingCheckConfig,
    #[serde(default)]
    pub save_deferral: SaveDeferralConfig,
    #[serde(default)]
    pub view_only: ViewOnlyConfig,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&content)?;
        tracing::debug!("loaded session config from {}", path.as_ref().display());
        Ok(config)
    }
}

/// Configuration for close detection.
///
/// The host never announces that its last document closed. After a document
/// is destroyed the session waits `delay_ms` and then asks the host how many
/// documents remain open.
///
/// # Defaults
///
/// - `delay_ms`: `200`
///
/// Values above 10 000 are clamped with a warning.
#[derive(Debug, Clone, Deserialize)]
pub struct ClosingCheckConfig {
    #[serde(
        default = "default_closing_delay_ms",
        deserialize_with = "deserialize_closing_delay"
    )]
    pub delay_ms: u64,
}

impl ClosingCheckConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for ClosingCheckConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_closing_delay_ms(),
        }
    }
}

/// Which save paths hand a first save over to the deferred resync.
///
/// When an unsaved document is saved for the first time the host swaps its
/// native handle right after the call returns. With deferral enabled the proxy
/// does not reload against the dying handle; the session resynchronises on the
/// next idle notification instead. With deferral disabled the proxy reloads
/// immediately.
///
/// # Defaults
///
/// - `save`: `true`
/// - `save_as`: `true`
///
/// # Examples
///
/// ```
/// use docsession::config::{SaveDeferralConfig, SaveVariant};
///
/// let config = SaveDeferralConfig { save: true, save_as: false };
/// assert!(config.defers(SaveVariant::Save));
/// assert!(!config.defers(SaveVariant::SaveAs));
/// ```
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct SaveDeferralConfig {
    #[serde(default = "default_true")]
    pub save: bool,
    #[serde(default = "default_true")]
    pub save_as: bool,
}

impl SaveDeferralConfig {
    pub const fn defers(&self, variant: SaveVariant) -> bool {
        match variant {
            SaveVariant::Save => self.save,
            SaveVariant::SaveAs => self.save_as,
        }
    }
}

impl Default for SaveDeferralConfig {
    fn default() -> Self {
        Self {
            save: true,
            save_as: true,
        }
    }
}

/// Save entry points of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveVariant {
    Save,
    SaveAs,
}

/// Configuration for synthetic open events of view-only documents.
///
/// # Defaults
///
/// - `enabled`: `true`
#[derive(Debug, Clone, Deserialize)]
pub struct ViewOnlyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ViewOnlyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// Default value functions
const fn default_true() -> bool {
    true
}

const fn default_closing_delay_ms() -> u64 {
    200
}

/// Upper bound for the closing-check delay.
const MAX_CLOSING_DELAY_MS: u64 = 10_000;

fn validate_closing_delay(delay_ms: u64) -> u64 {
    if delay_ms > MAX_CLOSING_DELAY_MS {
        tracing::warn!(
            "closing_check.delay_ms {} exceeds {}, clamping",
            delay_ms,
            MAX_CLOSING_DELAY_MS
        );
        MAX_CLOSING_DELAY_MS
    } else {
        delay_ms
    }
}

fn deserialize_closing_delay<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let delay_ms = u64::deserialize(deserializer)?;
    Ok(validate_closing_delay(delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.closing_check.delay_ms, 200);
        assert_eq!(config.closing_check.delay(), Duration::from_millis(200));
        assert!(config.save_deferral.save);
        assert!(config.save_deferral.save_as);
        assert!(config.view_only.enabled);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config.closing_check.delay_ms, 200);
        assert!(config.view_only.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let json = r#"{
            "view_only": { "enabled": false },
            "save_deferral": { "save": false }
        }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert!(!config.view_only.enabled);
        assert!(!config.save_deferral.save);
        assert!(config.save_deferral.save_as);
        assert_eq!(config.closing_check.delay_ms, 200);
    }

    #[test]
    fn test_closing_delay_clamped() {
        let json = r#"{ "closing_check": { "delay_ms": 60000 } }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.closing_check.delay_ms, MAX_CLOSING_DELAY_MS);
    }

    #[test]
    fn test_closing_delay_at_limit_kept() {
        let json = r#"{ "closing_check": { "delay_ms": 10000 } }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.closing_check.delay_ms, 10_000);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = SessionConfig::from_json(r#"{ "closing_check": { "delay_ms": "soon" } }"#)
            .unwrap_err();
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_save_deferral_variants() {
        let config = SaveDeferralConfig {
            save: false,
            save_as: true,
        };
        assert!(!config.defers(SaveVariant::Save));
        assert!(config.defers(SaveVariant::SaveAs));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "closing_check": {{ "delay_ms": 50 }} }}"#).unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.closing_check.delay_ms, 50);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SessionConfig::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("I/O error"));
    }
}
