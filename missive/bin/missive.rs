//! Loads the configuration and runs the pipeline's workers until signalled.
//!
//! The binary has no way to accept batches. It is useful for validating a
//! configuration and store; applications submit mail through the library.

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use missive::{Missive, find_config_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let missive = Missive::from_file(&config_path)?;

    missive.run().await
}
