pub mod config_manager;
pub mod discovery;
pub mod management;
pub mod monitor_files;
pub mod reconciler;
pub mod registration;
pub mod scout_client;

pub use scout_client::ScoutClient;
