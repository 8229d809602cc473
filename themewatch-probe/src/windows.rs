//! Windows registry backend, driven through `reg.exe`.
//!
//! Both values are DWORDs under the per-user personalisation key, where 1
//! means light and 0 means dark. A value that does not exist reads as light.
//! After a write that changed anything, `WM_SETTINGCHANGE` is broadcast with
//! `ImmersiveColorSet` so running apps pick up the new colours.

use themewatch_core::{ThemeMode, ThemeState};

use crate::command::run;
use crate::error::AccessError;
use crate::reader::StateReader;

const REG: &str = "reg";
pub const PERSONALIZE_KEY: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize";
pub const APPS_USE_LIGHT_THEME: &str = "AppsUseLightTheme";
pub const SYSTEM_USES_LIGHT_THEME: &str = "SystemUsesLightTheme";
#[cfg(windows)]
const BROADCAST_TIMEOUT_MS: u32 = 5000;

#[derive(Debug, Default)]
pub struct WindowsRegistryReader;

impl WindowsRegistryReader {
    pub fn new() -> Self {
        Self
    }

    /// Both flags from one listing of the key. A value missing from the
    /// listing is `None`; a missing key lists nothing.
    fn query(&self) -> Result<PersonalizeValues, AccessError> {
        let output = run(REG, &["query", PERSONALIZE_KEY])?;
        if !output.success {
            // reg.exe exits 1 for "unable to find the specified registry key or value".
            if output.stderr.to_ascii_lowercase().contains("unable to find") {
                return Ok(PersonalizeValues::default());
            }
            return Err(output.into_failure(REG));
        }
        Ok(parse_personalize_listing(&output.stdout))
    }

    fn set(&self, value: &'static str, flag: u32) -> Result<(), AccessError> {
        let data = flag.to_string();
        let output = run(
            REG,
            &[
                "add",
                PERSONALIZE_KEY,
                "/v",
                value,
                "/t",
                "REG_DWORD",
                "/d",
                data.as_str(),
                "/f",
            ],
        )?;
        if output.success {
            Ok(())
        } else {
            Err(output.into_failure(REG))
        }
    }
}

impl StateReader for WindowsRegistryReader {
    fn name(&self) -> &'static str {
        "windows-registry"
    }

    fn sample(&self) -> Result<ThemeState, AccessError> {
        Ok(self.query()?.state())
    }

    fn write(&self, mode: ThemeMode) -> Result<(), AccessError> {
        let flag = mode.light_flag();
        let current = self.query()?;
        let mut changed = false;
        for (value, present) in [
            (APPS_USE_LIGHT_THEME, current.apps_use_light_theme),
            (SYSTEM_USES_LIGHT_THEME, current.system_uses_light_theme),
        ] {
            if present.map(ThemeMode::from_light_flag) != Some(mode) {
                self.set(value, flag)?;
                changed = true;
            }
        }
        if changed {
            notify_theme_change();
        }
        Ok(())
    }
}

/// Raw DWORDs under the personalisation key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersonalizeValues {
    pub apps_use_light_theme: Option<u32>,
    pub system_uses_light_theme: Option<u32>,
}

impl PersonalizeValues {
    pub fn state(&self) -> ThemeState {
        let mode = |flag: Option<u32>| {
            flag.map(ThemeMode::from_light_flag)
                .unwrap_or(ThemeMode::Light)
        };
        ThemeState::new(
            mode(self.apps_use_light_theme),
            mode(self.system_uses_light_theme),
        )
    }
}

/// Pick both theme flags out of a full `reg query <key>` listing.
pub fn parse_personalize_listing(stdout: &str) -> PersonalizeValues {
    PersonalizeValues {
        apps_use_light_theme: parse_reg_dword(stdout, APPS_USE_LIGHT_THEME),
        system_uses_light_theme: parse_reg_dword(stdout, SYSTEM_USES_LIGHT_THEME),
    }
}

/// Tell running windows the colour set changed, so open apps repaint.
///
/// Best effort: a hung top-level window is skipped after the timeout and a
/// failed broadcast does not undo the registry write.
#[cfg(windows)]
fn notify_theme_change() {
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
    };

    let area: Vec<u16> = "ImmersiveColorSet"
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    let mut result: usize = 0;
    // SAFETY: `area` is a NUL-terminated UTF-16 string that outlives the
    // call, and `result` is a valid out pointer.
    let sent = unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            0,
            area.as_ptr() as isize,
            SMTO_ABORTIFHUNG,
            BROADCAST_TIMEOUT_MS,
            &mut result,
        )
    };
    if sent == 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "theme change broadcast failed",
        );
    }
}

#[cfg(not(windows))]
fn notify_theme_change() {}

/// Extract a DWORD from `reg query` output.
///
/// ```text
/// HKEY_CURRENT_USER\Software\...\Personalize
///     AppsUseLightTheme    REG_DWORD    0x1
/// ```
pub fn parse_reg_dword(stdout: &str, value: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        if !name.eq_ignore_ascii_case(value) {
            return None;
        }
        if parts.next()? != "REG_DWORD" {
            return None;
        }
        let data = parts.next()?;
        let hex = data
            .strip_prefix("0x")
            .or_else(|| data.strip_prefix("0X"))?;
        u32::from_str_radix(hex, 16).ok()
    })
}
