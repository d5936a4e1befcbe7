use crate::layout::{Aspect, EmptyCells, LayoutPolicy, RotationPolicy};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub ui: UiSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    /// Use wss:// and https://
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub cooldown_ms: u64,
    pub icons: bool,
    pub empty_cells: EmptyCells,
    /// Seconds per frame of the UI loop
    pub frame_time: f32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 100,
            icons: true,
            empty_cells: EmptyCells::Absent,
            frame_time: 0.03,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub horizontal_flips_when: Aspect,
    pub vertical_flips_when: Aspect,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        let rotation = RotationPolicy::default();
        Self {
            horizontal_flips_when: rotation.horizontal_flips_when,
            vertical_flips_when: rotation.vertical_flips_when,
        }
    }
}

impl Settings {
    /// Load the settings file, falling back to defaults when it is missing or broken.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("macrodeck")
            .join("client.toml")
    }

    pub fn layout_policy(&self, empty_cells: Option<EmptyCells>) -> LayoutPolicy {
        LayoutPolicy {
            rotation: RotationPolicy {
                horizontal_flips_when: self.layout.horizontal_flips_when,
                vertical_flips_when: self.layout.vertical_flips_when,
            },
            empty_cells: empty_cells.unwrap_or(self.ui.empty_cells),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.ui.cooldown_ms, 100);
        assert!(settings.ui.icons);
        assert_eq!(settings.layout_policy(None), LayoutPolicy::default());
        assert!(settings.server.host.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            host = "deck.local"
            port = 8080
            password = "pw"

            [ui]
            cooldown_ms = 250
            empty_cells = "placeholder"

            [layout]
            horizontal_flips_when = "landscape"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.host.as_deref(), Some("deck.local"));
        assert_eq!(settings.server.port, Some(8080));
        assert_eq!(settings.ui.cooldown_ms, 250);
        assert!(settings.ui.icons);

        let policy = settings.layout_policy(None);
        assert_eq!(policy.empty_cells, EmptyCells::Placeholder);
        assert_eq!(policy.rotation.horizontal_flips_when, Aspect::Landscape);
        assert_eq!(policy.rotation.vertical_flips_when, Aspect::Landscape);

        // CLI flag wins
        assert_eq!(settings.layout_policy(Some(EmptyCells::Absent)).empty_cells, EmptyCells::Absent);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = Settings::load_from(Path::new("/nonexistent/macrodeck/client.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("reading"));
    }
}
