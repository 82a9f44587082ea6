//! Unit naming conventions
//!
//! Input units carry the `ORG-` prefix; generated units use `DEF-` for
//! deformers, `MCH-` for mechanism helpers and no prefix for controls.

/// Prefix of original (input) units
pub const ORG_PREFIX: &str = "ORG-";
/// Prefix of deformer units
pub const DEF_PREFIX: &str = "DEF-";
/// Prefix of mechanism units
pub const MCH_PREFIX: &str = "MCH-";

/// Name without the `ORG-` prefix
#[must_use]
pub fn strip_org(name: &str) -> &str {
    name.strip_prefix(ORG_PREFIX).unwrap_or(name)
}

/// Original unit name for `name`
#[must_use]
pub fn org_name(name: &str) -> String {
    format!("{ORG_PREFIX}{}", strip_org(name))
}

/// Deformer name for `name`
#[must_use]
pub fn deformer_name(name: &str) -> String {
    format!("{DEF_PREFIX}{name}")
}

/// Mechanism name for `name`
#[must_use]
pub fn mechanism_name(name: &str) -> String {
    format!("{MCH_PREFIX}{name}")
}

/// Base of a chain name: trailing digits and separators removed, side
/// suffix (`.L`, `_R`, ...) kept apart
///
/// `finger1.L` gives `("finger", ".L")`.
#[must_use]
pub fn split_chain_name(name: &str) -> (&str, &str) {
    let split = name
        .len()
        .checked_sub(2)
        .filter(|i| name.is_char_boundary(*i))
        .map(|i| name.split_at(i));
    let (body, side) = match split {
        Some((body, side))
            if matches!(side.as_bytes(), [b'.' | b'_' | b'-', b'L' | b'l' | b'R' | b'r']) =>
        {
            (body, side)
        }
        _ => (name, ""),
    };
    let base = body.trim_end_matches(|c: char| c.is_ascii_digit());
    let base = base.trim_end_matches(['.', '_', '-']);
    (if base.is_empty() { body } else { base }, side)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_org_prefix() {
        assert_eq!(strip_org("ORG-upper_arm.L"), "upper_arm.L");
        assert_eq!(strip_org("upper_arm.L"), "upper_arm.L");
        assert_eq!(org_name("ORG-hand"), "ORG-hand");
        assert_eq!(org_name("hand"), "ORG-hand");
    }

    #[test]
    fn prefixed_names() {
        assert_eq!(deformer_name("spine"), "DEF-spine");
        assert_eq!(mechanism_name("spine"), "MCH-spine");
    }

    #[test]
    fn chain_names() {
        assert_eq!(split_chain_name("finger1.L"), ("finger", ".L"));
        assert_eq!(split_chain_name("finger_01"), ("finger", ""));
        assert_eq!(split_chain_name("thumb"), ("thumb", ""));
        assert_eq!(split_chain_name("42"), ("42", ""));
    }
}
