//! API handlers

pub mod assist;
pub mod chat;
pub mod health;
pub mod products;
pub mod search;
pub mod webhook;
