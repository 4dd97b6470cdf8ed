//! Common types used across the plugin host.

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

/// JSON object used for open-ended configuration keys.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
