/// Wikiboard client: document stores, the fetch-merge-save cycle, config,
/// logging and the command-line front end.
pub mod cli;
pub mod config;
pub mod log_bridge;
pub mod store;
pub mod sync;
