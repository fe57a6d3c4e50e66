//! Armorybot: a Discord bot that mirrors the EBP game catalog into channels.
//!
//! Channels opt in through a topic tag; each catalog item becomes one embed
//! carrying a rendered page screenshot. Screenshots are published once to a
//! storage channel and reused from there, so a steady-state sweep touches
//! neither the browser nor the upload path.

pub mod capture;
pub mod catalog;
pub mod chat;
pub mod commands;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod i18n;
pub mod sync;
pub mod web;

pub use error::{Error, Result};
