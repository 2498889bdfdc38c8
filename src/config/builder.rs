//! Default configuration file creation.
//!
//! The standalone host writes a commented `suncycle.toml` on first run so the
//! user has something to edit. Optional keys are written commented out, which
//! keeps the defaults on IP lookup and computed sunrise/sunset.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::constants::*;
use crate::period::Period;

const DEFAULT_DAY_COLOR_SCHEME: &str = "Packages/Color Scheme - Default/Breakers.sublime-color-scheme";
const DEFAULT_DAY_THEME: &str = "Default.sublime-theme";
const DEFAULT_NIGHT_COLOR_SCHEME: &str = "Packages/Color Scheme - Default/Mariana.sublime-color-scheme";
const DEFAULT_NIGHT_THEME: &str = "Default Dark.sublime-theme";

/// Write the default configuration to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;
    Ok(())
}

pub fn default_config_content() -> String {
    ConfigBuilder::new()
        .add_section("Fixed location")
        .add_commented_setting(
            "latitude",
            "40.7128",
            "Latitude (-90 to 90), omit both to locate by IP",
        )
        .add_commented_setting("longitude", "-74.0060", "Longitude (-180 to 180)")
        .add_section("Fixed times")
        .add_commented_setting(
            "sunrise",
            "\"06:30\"",
            &format!("Start of day ({FIXED_TIME_FORMAT}, 24-hour)"),
        )
        .add_commented_setting(
            "sunset",
            "\"19:45\"",
            &format!("Start of night ({FIXED_TIME_FORMAT}, 24-hour)"),
        )
        .add_table(Period::Day.key())
        .add_setting(
            COLOR_SCHEME_KEY,
            &format!("\"{DEFAULT_DAY_COLOR_SCHEME}\""),
            "Color scheme while the sun is up",
        )
        .add_setting(
            THEME_KEY,
            &format!("\"{DEFAULT_DAY_THEME}\""),
            "Theme while the sun is up",
        )
        .add_table(Period::Night.key())
        .add_setting(
            COLOR_SCHEME_KEY,
            &format!("\"{DEFAULT_NIGHT_COLOR_SCHEME}\""),
            "Color scheme after sunset",
        )
        .add_setting(
            THEME_KEY,
            &format!("\"{DEFAULT_NIGHT_THEME}\""),
            "Theme after sunset",
        )
        .build()
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

#[derive(Clone)]
enum ConfigEntry {
    /// Comment heading, purely visual
    Section(String),
    /// TOML table header
    Table(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_table(mut self, name: &str) -> Self {
        self.entries.push(ConfigEntry::Table(format!("[{name}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn add_commented_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("# {key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Align trailing comments on the longest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(header) | ConfigEntry::Table(header) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(header);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        let mut content = result.join("\n");
        content.push('\n');
        content
    }
}
