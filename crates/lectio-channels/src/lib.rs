//! Communication channels. Telegram is the only sink for now; anything
//! implementing `lectio_core::MessageSink` can stand in for it.

mod telegram;

pub use telegram::{TelegramBot, TelegramChat, TelegramMessage, TelegramUpdate, TelegramUser};
