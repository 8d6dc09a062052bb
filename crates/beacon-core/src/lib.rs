pub mod bus;

pub use bus::{ChangeEvent, EventBus, SharedEventBus};

/// 当前 unix 秒时间戳
pub fn now_sec() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
