//! Hostname and zone-name syntax validation.
//!
//! RFC1035-flavored label grammar: labels are 1-63 characters, start and
//! end alphanumeric, and may contain `-` and `_` in the interior. A valid
//! name has at least two labels and at most 253 characters total.

/// Maximum length of a full name, in characters.
const MAX_NAME_LENGTH: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LENGTH: usize = 63;

/// Whether `name` is an acceptable host name.
pub fn valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    labels.iter().all(|label| valid_label(label))
}

/// Whether `domain` is an acceptable zone name.
///
/// A zone is valid when a host directly under it would be, so single-label
/// zones (TLD-style) are accepted as long as the combined name is.
pub fn valid_zone(domain: &str) -> bool {
    valid_name(&format!("x.{domain}"))
}

fn valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return false;
    }

    let bytes = label.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return false;
    }

    bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
}
