//! Relay bridge: forwards source-network chats to an operator's control
//! channel and relays the operator's replies back.

pub mod bridge;
pub mod cache;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod pagination;
