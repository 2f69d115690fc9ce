//! 20-digit store token: group(3) + site(4) + store(6) + menu(7).
//!
//! This is the value banks echo back in `ref1` on PromptPay Bill Payment
//! webhooks, so back-transaction matching depends on it round-tripping
//! exactly.

use crate::error::ApiError;

/// Builds the 20-digit store token. Rejects any component that doesn't fit
/// in its allotted width instead of silently truncating it -- a truncated
/// token would still parse as a different, valid-looking store.
pub fn generate(group_id: u32, site_id: u32, store_id: u32, menu_id: u32) -> Result<String, ApiError> {
    if group_id > 999 {
        return Err(ApiError::Validation(format!(
            "group_id {group_id} exceeds 3-digit width"
        )));
    }
    if site_id > 9_999 {
        return Err(ApiError::Validation(format!(
            "site_id {site_id} exceeds 4-digit width"
        )));
    }
    if store_id > 999_999 {
        return Err(ApiError::Validation(format!(
            "store_id {store_id} exceeds 6-digit width"
        )));
    }
    if menu_id > 9_999_999 {
        return Err(ApiError::Validation(format!(
            "menu_id {menu_id} exceeds 7-digit width"
        )));
    }
    Ok(format!(
        "{:03}{:04}{:06}{:07}",
        group_id, site_id, store_id, menu_id
    ))
}

pub struct StoreTokenParts {
    pub group_id: u32,
    pub site_id: u32,
    pub store_id: u32,
    pub menu_id: u32,
}

/// Parses a 20-digit token back into its components. Returns `None` if the
/// token isn't exactly 20 ASCII digits.
pub fn parse(token: &str) -> Option<StoreTokenParts> {
    if token.len() != 20 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(StoreTokenParts {
        group_id: token[0..3].parse().ok()?,
        site_id: token[3..7].parse().ok()?,
        store_id: token[7..13].parse().ok()?,
        menu_id: token[13..20].parse().ok()?,
    })
}

/// Derives a banking biller ID from a merchant tax ID, unless an explicit
/// override is supplied (some banks assign a biller ID independent of tax
/// registration). An override is stripped of non-digits and left-padded/
/// truncated to 15. Otherwise the tax ID is stripped of non-digits, a
/// fixed `"99"` suffix tenant-code is appended, and the result is
/// left-padded/truncated to 15.
pub fn derive_biller_id(tax_id: &str, override_biller_id: Option<&str>) -> Result<String, ApiError> {
    if let Some(explicit) = override_biller_id {
        let digits: String = explicit.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(ApiError::Validation(
                "biller_id override must contain at least one digit".to_string(),
            ));
        }
        return Ok(left_pad_or_truncate_15(&digits));
    }

    let digits: String = tax_id.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(ApiError::Validation(
            "tax_id must contain at least one digit".to_string(),
        ));
    }
    Ok(left_pad_or_truncate_15(&format!("{digits}99")))
}

fn left_pad_or_truncate_15(digits: &str) -> String {
    if digits.len() > 15 {
        digits[..15].to_string()
    } else {
        format!("{:0>15}", digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_zero_padded_twenty_digits() {
        let token = generate(1, 23, 456, 0).unwrap();
        assert_eq!(token, "00100230004560000000");
        assert_eq!(token.len(), 20);
    }

    #[test]
    fn round_trips_through_parse() {
        let token = generate(7, 42, 100, 3).unwrap();
        let parts = parse(&token).unwrap();
        assert_eq!(parts.group_id, 7);
        assert_eq!(parts.site_id, 42);
        assert_eq!(parts.store_id, 100);
        assert_eq!(parts.menu_id, 3);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(parse("12345").is_none());
    }

    #[test]
    fn rejects_non_digit_bytes() {
        assert!(parse("0010023000456000000x").is_none());
    }

    #[test]
    fn rejects_component_exceeding_its_width() {
        assert!(generate(1_000, 1, 1, 1).is_err());
        assert!(generate(1, 10_000, 1, 1).is_err());
        assert!(generate(1, 1, 1_000_000, 1).is_err());
        assert!(generate(1, 1, 1, 10_000_000).is_err());
    }

    #[test]
    fn derives_biller_id_from_tax_id() {
        let biller_id = derive_biller_id("0-1055-61000-87-5", None).unwrap();
        assert_eq!(biller_id, "010556100087599");
        assert_eq!(biller_id.len(), 15);
    }

    #[test]
    fn explicit_override_takes_precedence_over_tax_id() {
        let biller_id = derive_biller_id("0-1055-61000-87-5", Some("999999999999999")).unwrap();
        assert_eq!(biller_id, "999999999999999");
    }

    #[test]
    fn rejects_tax_id_with_no_digits() {
        assert!(derive_biller_id("abc", None).is_err());
    }

    #[test]
    fn rejects_non_digit_override() {
        assert!(derive_biller_id("0105561000875", Some("abc")).is_err());
    }
}
