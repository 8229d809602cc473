//! Enable/disable switch for persistence mode.
//!
//! The controller only mutates the shared [`PersistenceConfig`]; it never
//! writes the theme itself. The engine reads the config at the start of each
//! tick and decides whether a correction is due.

use std::sync::{Arc, RwLock};

use themewatch_core::{PersistenceConfig, ThemeMode};

#[derive(Debug, Clone, Default)]
pub struct PersistenceController {
    config: Arc<RwLock<PersistenceConfig>>,
}

impl PersistenceController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle shared with the tick engine.
    pub fn shared(&self) -> Arc<RwLock<PersistenceConfig>> {
        Arc::clone(&self.config)
    }

    pub fn enable(&self, desired_mode: ThemeMode) -> PersistenceConfig {
        let next = PersistenceConfig::enabled(desired_mode);
        self.replace(next);
        tracing::info!(mode = %desired_mode, "persistence enabled");
        next
    }

    pub fn disable(&self) -> PersistenceConfig {
        let next = PersistenceConfig::disabled();
        self.replace(next);
        tracing::info!("persistence disabled");
        next
    }

    pub fn status(&self) -> PersistenceConfig {
        *self
            .config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn replace(&self, next: PersistenceConfig) {
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_and_disable_replace_the_whole_config() {
        let controller = PersistenceController::new();
        assert_eq!(controller.status(), PersistenceConfig::disabled());

        controller.enable(ThemeMode::Dark);
        assert_eq!(controller.status(), PersistenceConfig::enabled(ThemeMode::Dark));

        controller.enable(ThemeMode::Light);
        assert_eq!(controller.status().desired_mode, Some(ThemeMode::Light));

        controller.disable();
        let status = controller.status();
        assert!(!status.enabled);
        assert_eq!(status.desired_mode, None);
    }

    #[test]
    fn shared_handle_sees_updates() {
        let controller = PersistenceController::new();
        let shared = controller.shared();
        controller.enable(ThemeMode::Dark);
        assert_eq!(shared.read().unwrap().enforcing(), Some(ThemeMode::Dark));
    }
}
