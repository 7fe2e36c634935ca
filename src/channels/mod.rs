//! Network clients on both sides of the bridge.

pub mod channel;
pub mod cli;
pub mod gateway;
pub mod telegram;

pub use channel::*;
pub use cli::ConsoleSource;
pub use gateway::GatewaySource;
pub use telegram::TelegramControl;
