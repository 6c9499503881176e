//! Scripted world for rehearsing the Quarry hunt loop without a live client.
//!
//! # Modules
//!
//! - [`config`] -- Scenario files: the hunt profile plus the world script.
//! - [`world`] -- [`SimHost`], a frame-stepped environment implementing every
//!   host collaborator trait.
//!
//! [`SimHost`]: world::SimHost

pub mod config;
pub mod world;
