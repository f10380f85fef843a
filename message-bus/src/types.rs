//! Core types for the fan-out channel

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Broadcast topic, one per aggregate type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Create new topic
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generic broadcast message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message<T> {
    /// Message ID
    pub message_id: Uuid,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Payload
    pub payload: T,
}

impl<T> Message<T> {
    /// Create new message
    pub fn new(payload: T) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            payload,
        }
    }
}
