//! In-process theme store with failure injection.
//!
//! Lets the monitor's tick logic be exercised without touching the OS: tests
//! play the external actor with [`MemoryStateReader::set_external`] and make
//! the store flaky with [`MemoryStateReader::fail_next_samples`].

use std::sync::Mutex;

use themewatch_core::{ThemeMode, ThemeState};

use crate::error::AccessError;
use crate::reader::StateReader;

#[derive(Debug, Default)]
struct Inner {
    app_mode: ThemeMode,
    system_mode: ThemeMode,
    failing_samples: u32,
    failing_writes: u32,
    writes: u32,
}

#[derive(Debug, Default)]
pub struct MemoryStateReader {
    inner: Mutex<Inner>,
}

impl MemoryStateReader {
    pub fn new(mode: ThemeMode) -> Self {
        Self::with_modes(mode, mode)
    }

    pub fn with_modes(app_mode: ThemeMode, system_mode: ThemeMode) -> Self {
        Self {
            inner: Mutex::new(Inner {
                app_mode,
                system_mode,
                ..Inner::default()
            }),
        }
    }

    /// Change both settings as an outside process would; not counted as a write.
    pub fn set_external(&self, mode: ThemeMode) {
        self.set_external_modes(mode, mode);
    }

    pub fn set_external_modes(&self, app_mode: ThemeMode, system_mode: ThemeMode) {
        let mut inner = self.lock();
        inner.app_mode = app_mode;
        inner.system_mode = system_mode;
    }

    /// The next `n` calls to `sample` fail with [`AccessError::Unavailable`].
    pub fn fail_next_samples(&self, n: u32) {
        self.lock().failing_samples = n;
    }

    /// The next `n` calls to `write` fail with [`AccessError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.lock().failing_writes = n;
    }

    /// Number of writes that actually changed the store.
    pub fn write_count(&self) -> u32 {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateReader for MemoryStateReader {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn sample(&self) -> Result<ThemeState, AccessError> {
        let mut inner = self.lock();
        if inner.failing_samples > 0 {
            inner.failing_samples -= 1;
            return Err(AccessError::Unavailable("injected sample failure".to_string()));
        }
        Ok(ThemeState::new(inner.app_mode, inner.system_mode))
    }

    fn write(&self, mode: ThemeMode) -> Result<(), AccessError> {
        let mut inner = self.lock();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(AccessError::Unavailable("injected write failure".to_string()));
        }
        if inner.app_mode == mode && inner.system_mode == mode {
            return Ok(());
        }
        inner.app_mode = mode;
        inner.system_mode = mode;
        inner.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_failures_are_consumed() {
        let store = MemoryStateReader::new(ThemeMode::Light);
        store.fail_next_samples(2);
        assert!(store.sample().is_err());
        assert!(store.sample().is_err());
        assert!(store.sample().is_ok());
    }

    #[test]
    fn write_is_idempotent() {
        let store = MemoryStateReader::new(ThemeMode::Light);
        store.write(ThemeMode::Dark).unwrap();
        store.write(ThemeMode::Dark).unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn external_changes_are_not_writes() {
        let store = MemoryStateReader::new(ThemeMode::Light);
        store.set_external_modes(ThemeMode::Dark, ThemeMode::Light);
        let state = store.sample().unwrap();
        assert_eq!(state.app_mode, ThemeMode::Dark);
        assert_eq!(state.system_mode, ThemeMode::Light);
        assert_eq!(store.write_count(), 0);
    }
}
