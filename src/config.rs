//! Process-wide engine configuration.
//!
//! Initialized at most once before [`mount`](crate::mount) and read-only from
//! then on. Nothing may re-initialize it during a render pass; `configure`
//! after the first mount reports [`EngineError::Config`].

use std::cell::Cell;

use crate::error::EngineError;

/// Engine tunables.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Upper bound on render passes within one flush. Effects that keep
    /// queueing updates hit this limit instead of spinning forever.
    pub max_passes: usize,
    /// Reject props with fields absent from the declared parameter record.
    pub strict_props: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: 64,
            strict_props: true,
        }
    }
}

thread_local! {
    static CONFIG: Cell<EngineConfig> = Cell::new(EngineConfig::default());
    static FROZEN: Cell<bool> = const { Cell::new(false) };
}

/// Install the engine configuration. Must happen before the first mount.
pub fn configure(config: EngineConfig) -> Result<(), EngineError> {
    if FROZEN.with(|f| f.get()) {
        return Err(EngineError::Config(
            "engine already started, configuration is read-only".to_string(),
        ));
    }
    CONFIG.with(|c| c.set(config));
    Ok(())
}

/// Current configuration.
pub(crate) fn get() -> EngineConfig {
    CONFIG.with(|c| c.get())
}

/// Lock the configuration. Called by the first mount.
pub(crate) fn freeze() {
    FROZEN.with(|f| f.set(true));
}

/// Reset configuration state (for testing).
pub fn reset_config() {
    CONFIG.with(|c| c.set(EngineConfig::default()));
    FROZEN.with(|f| f.set(false));
}
