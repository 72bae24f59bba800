pub mod agence_bio;
pub mod catalog;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fuzzy_matcher;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod platform;
pub mod poller;
pub mod run;
pub mod validator;
pub mod watcher;
