//! GNOME settings backend (`gsettings`).
//!
//! - app-level: `org.gnome.desktop.interface color-scheme`
//!   (`prefer-dark` is dark, `default`/`prefer-light` are light)
//! - system-level: `org.gnome.desktop.interface gtk-theme`
//!   (a theme name ending in `-dark` is dark)
//!
//! Older GNOME releases have no `color-scheme` key; a missing key or schema
//! reads as light. Writing dark to a missing key is an error, since the
//! store would keep reading light.

use std::path::PathBuf;

use themewatch_core::{ThemeMode, ThemeState};

use crate::command::{run_as, CommandOutput};
use crate::error::AccessError;
use crate::reader::StateReader;

const GSETTINGS: &str = "gsettings";
const SCHEMA: &str = "org.gnome.desktop.interface";
const COLOR_SCHEME_KEY: &str = "color-scheme";
const GTK_THEME_KEY: &str = "gtk-theme";
const DARK_SUFFIX: &str = "-dark";

#[derive(Debug)]
pub struct GnomeReader {
    binary: PathBuf,
}

impl Default for GnomeReader {
    fn default() -> Self {
        Self::with_binary(GSETTINGS)
    }
}

impl GnomeReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `gsettings` executable instead of the one on `PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `Ok(None)` when the key or schema does not exist.
    fn get(&self, key: &str) -> Result<Option<String>, AccessError> {
        let output = run_as(GSETTINGS, &self.binary, &["get", SCHEMA, key])?;
        if output.success {
            return Ok(Some(parse_gsettings_string(&output.stdout)));
        }
        if is_missing_key(&output) {
            return Ok(None);
        }
        Err(output.into_failure(GSETTINGS))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AccessError> {
        let output = run_as(GSETTINGS, &self.binary, &["set", SCHEMA, key, value])?;
        if output.success {
            Ok(())
        } else {
            Err(output.into_failure(GSETTINGS))
        }
    }
}

impl StateReader for GnomeReader {
    fn name(&self) -> &'static str {
        "gnome"
    }

    fn sample(&self) -> Result<ThemeState, AccessError> {
        let app = self
            .get(COLOR_SCHEME_KEY)?
            .map(|v| color_scheme_mode(&v))
            .unwrap_or(ThemeMode::Light);
        let system = self
            .get(GTK_THEME_KEY)?
            .map(|v| gtk_theme_mode(&v))
            .unwrap_or(ThemeMode::Light);
        Ok(ThemeState::new(app, system))
    }

    fn write(&self, mode: ThemeMode) -> Result<(), AccessError> {
        let mut missing = Vec::new();

        match self.get(COLOR_SCHEME_KEY)? {
            Some(current) if color_scheme_mode(&current) != mode => {
                self.set(COLOR_SCHEME_KEY, color_scheme_for(mode))?;
            }
            Some(_) => {}
            None if mode == ThemeMode::Light => {}
            None => missing.push(COLOR_SCHEME_KEY),
        }
        match self.get(GTK_THEME_KEY)? {
            Some(current) => {
                let target = gtk_theme_for(&current, mode);
                if target != current {
                    self.set(GTK_THEME_KEY, &target)?;
                }
            }
            None if mode == ThemeMode::Light => {}
            None => missing.push(GTK_THEME_KEY),
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessError::Unavailable(format!(
                "cannot set {mode}: {} not present in {SCHEMA}",
                missing.join(", ")
            )))
        }
    }
}

/// `'prefer-dark'\n` → `prefer-dark`
pub fn parse_gsettings_string(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(trimmed);
    unquoted.to_string()
}

pub fn color_scheme_mode(value: &str) -> ThemeMode {
    if value.eq_ignore_ascii_case("prefer-dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}

pub fn color_scheme_for(mode: ThemeMode) -> &'static str {
    match mode {
        ThemeMode::Dark => "prefer-dark",
        ThemeMode::Light => "default",
    }
}

pub fn gtk_theme_mode(theme: &str) -> ThemeMode {
    if theme.to_ascii_lowercase().ends_with(DARK_SUFFIX) {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}

/// Add or strip the `-dark` suffix so the theme family is preserved.
pub fn gtk_theme_for(current: &str, mode: ThemeMode) -> String {
    let base = if gtk_theme_mode(current) == ThemeMode::Dark {
        &current[..current.len() - DARK_SUFFIX.len()]
    } else {
        current
    };
    match mode {
        ThemeMode::Dark => format!("{base}{DARK_SUFFIX}"),
        ThemeMode::Light => base.to_string(),
    }
}

fn is_missing_key(output: &CommandOutput) -> bool {
    let stderr = output.stderr.to_ascii_lowercase();
    stderr.contains("no such key") || stderr.contains("no such schema")
}
