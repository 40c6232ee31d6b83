//! Chat transports. Telegram is the only one.

pub mod telegram;

pub use telegram::TelegramChannel;
