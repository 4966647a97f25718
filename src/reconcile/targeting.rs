//! Targeting filter.

use crate::events::ChangeMessage;

/// Whether `message` concerns the load balancer `managed_id`.
///
/// Exact match against the primary subject or any additional subject. No
/// prefix or partial matching.
pub fn is_targeted(message: &ChangeMessage, managed_id: &str) -> bool {
    message.subject_id == managed_id
        || message
            .additional_subject_ids
            .iter()
            .any(|id| id == managed_id)
}
