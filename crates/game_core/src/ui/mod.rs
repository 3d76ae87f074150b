//! UI-side services

pub mod localization;

pub use localization::{Localization, LocalizationError};
