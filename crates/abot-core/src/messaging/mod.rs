//! Outbound messaging abstractions (Telegram today, anything else later).

pub mod port;

pub use port::MessageSender;
