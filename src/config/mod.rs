//! Engine configuration, grounded on `original_source/src/common/config.cpp`.

pub mod main_config;

pub use main_config::{ControllerConfig, DevConfig, MainConfig, WindowConfig};
