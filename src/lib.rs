pub mod anilist;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod sanitize;
pub mod store;
pub mod sync;
