pub mod bot;
pub mod config;
pub mod constants;
pub mod discord;
pub mod domain;
pub mod logging;
pub mod routes;
pub mod services;
pub mod twitter;
