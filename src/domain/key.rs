//! Key normalization: document keys to XML element names

/// Label substituted for keys that cannot start an element name.
pub const FALLBACK_LABEL: &str = "field";

/// Convert a document key into a valid element label.
///
/// Rules, in order:
/// 1. `_id` becomes `id`
/// 2. `.` becomes `_`
/// 3. `$` becomes `DOLLAR_`
/// 4. any other character not allowed in an element name becomes `_`
/// 5. an empty result, or one starting with a digit or `-`, becomes [`FALLBACK_LABEL`]
///
/// Total and pure. Two distinct keys may map to the same label (`a.b`, `a_b`);
/// callers keep both.
pub fn normalize_key(key: &str) -> String {
    let mut label = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            '.' => label.push('_'),
            '$' => label.push_str("DOLLAR_"),
            c if is_name_char(c) => label.push(c),
            _ => label.push('_'),
        }
    }

    // Checked after the rewrite so that keys like " id" stay idempotent.
    if label == "_id" {
        "id".to_string()
    } else if is_valid_label(&label) {
        label
    } else {
        FALLBACK_LABEL.to_string()
    }
}

/// True if `label` can be used as an element name as-is.
pub fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

// `.` is a legal name char in XML but is rewritten before this check.
fn is_name_char(c: char) -> bool {
    c == '_' || c == '-' || c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_mongo_id_when_normalizing_then_returns_id() {
        assert_eq!(normalize_key("_id"), "id");
    }

    #[test]
    fn given_nested_id_when_normalizing_then_only_exact_match_is_replaced() {
        assert_eq!(normalize_key("patient._id"), "patient__id");
        assert_eq!(normalize_key("_idx"), "_idx");
    }

    #[test]
    fn given_key_rewriting_to_mongo_id_when_normalizing_then_stays_idempotent() {
        let once = normalize_key(" id");
        assert_eq!(once, "id");
        assert_eq!(normalize_key(&once), once);
    }

    #[test]
    fn given_operator_key_when_normalizing_then_dollar_is_spelled_out() {
        assert_eq!(normalize_key("$match"), "DOLLAR_match");
        assert_eq!(normalize_key("a$b"), "aDOLLAR_b");
    }

    #[test]
    fn given_leading_digit_when_normalizing_then_uses_fallback() {
        assert_eq!(normalize_key("1st_line"), FALLBACK_LABEL);
        assert_eq!(normalize_key(""), FALLBACK_LABEL);
        assert_eq!(normalize_key("-x"), FALLBACK_LABEL);
    }

    #[test]
    fn given_leading_dot_when_normalizing_then_becomes_underscore() {
        assert_eq!(normalize_key(".hidden"), "_hidden");
    }

    #[test]
    fn given_spaces_and_colons_when_normalizing_then_replaced_by_underscore() {
        assert_eq!(normalize_key("Hugo Symbol"), "Hugo_Symbol");
        assert_eq!(normalize_key("ns:key"), "ns_key");
    }

    #[test]
    fn given_unicode_letters_when_normalizing_then_kept() {
        assert_eq!(normalize_key("año"), "año");
    }
}
