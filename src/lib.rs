pub mod auth;
pub mod cleanup;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod report;
