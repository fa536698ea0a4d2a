// imgmod: token-authenticated image moderation relay
//
// This is the library root. Each module corresponds to a major subsystem
// of the relay.

pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod moderation;
pub mod scoring;
pub mod status;
pub mod tokens;
pub mod web;
