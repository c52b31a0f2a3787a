//! Prefixed UUID v7 identifiers.
//!
//! Every entity carries a short type prefix so IDs are self-describing in
//! logs and the wire protocol. UUID v7 keeps them time-sortable, which makes
//! the store's `ORDER BY` on IDs agree with insertion order.

use uuid::Uuid;

/// New session ID (`ses_` prefix).
#[must_use]
pub fn new_session_id() -> String {
    format!("ses_{}", Uuid::now_v7())
}

/// New message ID (`msg_` prefix).
#[must_use]
pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::now_v7())
}

/// New tool call ID (`call_` prefix).
#[must_use]
pub fn new_call_id() -> String {
    format!("call_{}", Uuid::now_v7())
}

/// New run ID (`run_` prefix).
#[must_use]
pub fn new_run_id() -> String {
    format!("run_{}", Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_type_prefixes() {
        assert!(new_session_id().starts_with("ses_"));
        assert!(new_message_id().starts_with("msg_"));
        assert!(new_call_id().starts_with("call_"));
        assert!(new_run_id().starts_with("run_"));
    }

    #[test]
    fn ids_are_unique() {
        let a = new_message_id();
        let b = new_message_id();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_parse_as_uuids() {
        let id = new_session_id();
        let raw = id.strip_prefix("ses_").unwrap();
        assert!(Uuid::parse_str(raw).is_ok());
    }
}
