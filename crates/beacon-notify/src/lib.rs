pub mod message;
pub mod notifier;
pub mod providers;

pub use message::{NotifyLevel, NotifyMessage};
pub use notifier::{Notifier, NotifyResult};
pub use providers::{TelegramConfig, TelegramNotifier, WebhookConfig, WebhookNotifier};
