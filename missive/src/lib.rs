//! Controller for the missive mail pipeline: loads the RON configuration,
//! builds the content store and SMTP transport, and runs the workers.

pub mod controller;

pub use controller::{Missive, MissiveConfig, find_config_file};
