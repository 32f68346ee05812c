pub mod api;
pub mod cancel;
pub mod cli;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod models;
pub mod rank;
pub mod report;
pub mod services;
pub mod settings;
pub mod threads;
pub mod usernames;
pub mod users;
pub mod window;
