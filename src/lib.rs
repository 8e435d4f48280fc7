pub mod config;
pub mod error;
pub mod migrate;
pub mod models;
pub mod target;

pub use config::MigrationConfig;
pub use error::{MigrationError, MigrationResult};
pub use migrate::{MigrationPipeline, MigrationReport, MigrationStep};
pub use target::{TargetApi, TargetClient};

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Install the process logger once. `RUST_LOG` overrides the default filter.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,reqwest=warn,hyper=warn"),
        )
        .init();
    });
}
