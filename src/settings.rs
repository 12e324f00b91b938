//! Host preferences
//!
//! Stored as XML under the platform config directory
//! (`<config>/Lightscript/preferences.xml`).

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Preferences for the lightscript host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "LightscriptPreferences")]
pub struct HostPreferences {
    /// Surface width in pixels
    #[serde(rename = "surfaceWidth", default = "default_surface_width")]
    pub surface_width: u32,

    #[serde(rename = "surfaceHeight", default = "default_surface_height")]
    pub surface_height: u32,

    /// Frame rate of the host loop (1-240)
    #[serde(rename = "targetFps", default = "default_target_fps")]
    pub target_fps: u32,

    /// Minimum spacing between non-forced control re-reads (16-5000 ms)
    #[serde(rename = "controlSampleIntervalMs", default = "default_sample_interval_ms")]
    pub control_sample_interval_ms: u64,

    /// Effect loaded when none is given on the command line
    #[serde(rename = "lastEffect", default, skip_serializing_if = "Option::is_none")]
    pub last_effect: Option<String>,
}

fn default_surface_width() -> u32 {
    320
}

fn default_surface_height() -> u32 {
    200
}

fn default_target_fps() -> u32 {
    60
}

fn default_sample_interval_ms() -> u64 {
    100
}

impl Default for HostPreferences {
    fn default() -> Self {
        Self {
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
            target_fps: default_target_fps(),
            control_sample_interval_ms: default_sample_interval_ms(),
            last_effect: None,
        }
    }
}

impl HostPreferences {
    fn prefs_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("Lightscript");
            p.push("preferences.xml");
            p
        })
    }

    /// Clamp values read from disk into their valid ranges
    pub fn sanitize(&mut self) {
        self.target_fps = self.target_fps.clamp(1, 240);
        self.control_sample_interval_ms = self.control_sample_interval_ms.clamp(16, 5000);
        self.surface_width = self.surface_width.max(1);
        self.surface_height = self.surface_height.max(1);
        if self.last_effect.as_deref().is_some_and(|e| e.trim().is_empty()) {
            self.last_effect = None;
        }
    }

    /// Load from the config directory, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::prefs_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable preferences");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::prefs_path().ok_or(SettingsError::NoConfigDir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        self.save_to_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut prefs: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;
        prefs.sanitize();
        Ok(prefs)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Remember the effect and persist, logging on failure
    pub fn set_last_effect(&mut self, effect_id: &str) {
        self.last_effect = Some(effect_id.to_string());
        if let Err(e) = self.save() {
            tracing::warn!("Failed to save preferences: {}", e);
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    NoConfigDir,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            SettingsError::NoConfigDir => write!(f, "Could not find config directory"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lightscript-{}-{}.xml", name, std::process::id()))
    }

    #[test]
    fn test_defaults() {
        let prefs = HostPreferences::default();
        assert_eq!(prefs.target_fps, 60);
        assert_eq!(prefs.control_sample_interval_ms, 100);
        assert!(prefs.last_effect.is_none());
    }

    #[test]
    fn test_file_round_trip() {
        let path = temp_path("roundtrip");
        let prefs = HostPreferences {
            surface_width: 640,
            surface_height: 360,
            target_fps: 30,
            control_sample_interval_ms: 250,
            last_effect: Some("sparkle_field".to_string()),
        };
        prefs.save_to_file(&path).unwrap();
        let loaded = HostPreferences::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, prefs);
    }

    #[test]
    fn test_missing_fields_and_clamping() {
        let path = temp_path("partial");
        fs::write(
            &path,
            "<LightscriptPreferences><targetFps>1000</targetFps><controlSampleIntervalMs>1</controlSampleIntervalMs></LightscriptPreferences>",
        )
        .unwrap();
        let loaded = HostPreferences::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.target_fps, 240);
        assert_eq!(loaded.control_sample_interval_ms, 16);
        assert_eq!(loaded.surface_width, 320);
        assert!(loaded.last_effect.is_none());
    }

    #[test]
    fn test_invalid_xml() {
        let path = temp_path("invalid");
        fs::write(&path, "<LightscriptPreferences><targetFps>fast</targetFps></LightscriptPreferences>").unwrap();
        let result = HostPreferences::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(SettingsError::XmlParse(_))));
    }
}
