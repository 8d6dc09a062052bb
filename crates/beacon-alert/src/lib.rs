pub mod engine;
pub mod model;
pub mod notifier;

pub use engine::AlertEngine;
pub use model::{Alert, AlertSeverity, AlertSummary, AlertThresholds};
pub use notifier::AlertNotifier;
