//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\assist-pipeline\
//!   macOS:   ~/Library/Application Support/assist-pipeline/
//!   Linux:   ~/.config/assist-pipeline/
//!
//! Data dir (recorded runs):
//!   Windows: %LOCALAPPDATA%\assist-pipeline\
//!   macOS:   ~/Library/Application Support/assist-pipeline/
//!   Linux:   ~/.local/share/assist-pipeline/

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding recorded runs for `replay`.
    pub runs_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "assist-pipeline";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let runs_dir = data_dir.join("runs");

        Self {
            config_dir,
            settings_file,
            runs_dir,
        }
    }

    /// Resolve a recording path: used as given when it exists, otherwise
    /// looked up in [`runs_dir`](Self::runs_dir).
    pub fn resolve_recording(&self, path: &Path) -> PathBuf {
        if path.exists() || path.is_absolute() {
            path.to_path_buf()
        } else {
            self.runs_dir.join(path)
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
