//! birthday-bot - Telegram bot that keeps a persistent registry of birthdays
//!
//! This library exports the core modules for testing and potential reuse.

pub mod commands;
pub mod logging;
pub mod models;
pub mod storage;
pub mod telegram;
