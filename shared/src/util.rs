use chrono::Utc;

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fresh random identifier (UUID v4)
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
