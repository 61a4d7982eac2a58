//! Unique ID generator.

use uuid::Uuid;

/// Generates unique identifiers for requests and report artifacts.
pub struct IdGenerator;

impl IdGenerator {
    /// Generates a unique report (artifact) ID.
    pub fn report_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a unique request ID.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Checks that `id` looks like an ID produced here.
    ///
    /// Used before turning an ID from a URL into a file name.
    pub fn is_valid(id: &str) -> bool {
        Uuid::parse_str(id).is_ok()
    }
}
