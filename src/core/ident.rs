//! Purpose: Identifier checks for KE-chain object ids.
//! Exports: `is_uuid`.
//! Role: Lets reference setters accept bare id strings without a server round trip.
//! Invariants: Only hyphenated or simple UUID text is accepted; no lookup is performed.
use uuid::Uuid;

pub fn is_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::is_uuid;

    #[test]
    fn accepts_hyphenated_uuid() {
        assert!(is_uuid("eeb0937b-da50-4eb2-8d74-f36259cca96e"));
    }

    #[test]
    fn rejects_names_and_numbers() {
        assert!(!is_uuid("Front Wheel"));
        assert!(!is_uuid("15"));
        assert!(!is_uuid(""));
    }
}
