//! # reel-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ReelSettings::default()`]
//! 2. **User file**: `~/.reel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `REEL_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads settings once and hands the
//! relevant sections to the components it builds.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
