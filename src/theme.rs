//! Light / dark theme and its persisted preference.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::TVError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// Colors used by the table ui for one theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub foreground: Color,
    pub header: Color,
    pub link: Color,
    pub muted: Color,
    pub selection: Color,
    pub error: Color,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: Color::Rgb(250, 250, 250),
                foreground: Color::Rgb(33, 37, 41),
                header: Color::Rgb(13, 110, 253),
                link: Color::Rgb(10, 88, 202),
                muted: Color::Rgb(108, 117, 125),
                selection: Color::Rgb(222, 226, 230),
                error: Color::Rgb(176, 42, 55),
            },
            Theme::Dark => Palette {
                background: Color::Rgb(33, 37, 41),
                foreground: Color::Rgb(222, 226, 230),
                header: Color::Rgb(110, 168, 254),
                link: Color::Rgb(110, 168, 254),
                muted: Color::Rgb(173, 181, 189),
                selection: Color::Rgb(52, 58, 64),
                error: Color::Rgb(234, 134, 143),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Settings {
    theme: Theme,
}

/// Reads and writes the theme preference as a small json document.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored theme, `None` if nothing was saved yet.
    pub fn load(&self) -> Result<Option<Theme>, TVError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(Some(settings.theme))
    }

    pub fn save(&self, theme: Theme) -> Result<(), TVError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&Settings { theme })?;
        fs::write(&self.path, content)?;
        debug!("Saved theme {} to {:?}", theme.as_str(), self.path);
        Ok(())
    }

    /// Stored preference, else the terminal's hint. Never fails.
    pub fn initial_theme(&self) -> Theme {
        match self.load() {
            Ok(Some(theme)) => {
                info!("Using saved theme {}", theme.as_str());
                theme
            }
            Ok(None) => system_preference(),
            Err(e) => {
                warn!("Ignoring unreadable settings {:?}: {e}", self.path);
                system_preference()
            }
        }
    }
}

/// Theme suggested by the terminal through `COLORFGBG`.
pub fn system_preference() -> Theme {
    preference_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
}

// COLORFGBG is "fg;bg" or "fg;default;bg". Background 7 and 15 are the light ansi colors.
fn preference_from_colorfgbg(value: Option<&str>) -> Theme {
    let background = value
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());
    match background {
        Some(7) | Some(15) => Theme::Light,
        _ => Theme::Dark,
    }
}
