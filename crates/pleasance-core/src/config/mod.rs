//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use pleasance_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Proxy: {}", cfg.proxy.base_url);
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config};
pub use schema::{
    BatchConfig, CatalogConfig, Config, GenerationConfig, ProxyConfig, ReviewConfig,
    SectionTemplate,
};
