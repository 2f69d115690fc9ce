//! PromptPay EMV Merchant-Presented-Mode QR payload codec.
//!
//! Two distinct payment rails share the EMV QR envelope:
//! - Tag 29, Credit Transfer, for sending money to an individual's mobile
//!   number / national ID / e-wallet.
//! - Tag 30, Bill Payment, for paying a registered biller (this is what
//!   stores use, keyed on the store token as `ref1`).
//!
//! They use different PromptPay AIDs and must never be conflated: scanning
//! a Tag 30 bill-payment QR built with the Tag 29 AID (or vice versa) is
//! rejected by bank apps.

pub mod crc16;
pub mod tlv;

use crate::error::ApiError;
use crate::money::Money;
use tlv::format_tag;

const AID_CREDIT_TRANSFER: &str = "A000000677010111"; // Tag 29
const AID_BILL_PAYMENT: &str = "A000000677010112"; // Tag 30

/// Target of a Tag 29 credit-transfer QR. Priority when multiple are
/// present (mirrors bank app behavior): mobile > national ID > e-wallet.
pub enum CreditTransferTarget {
    Mobile(String),
    NationalId(String),
    EWallet(String),
}

fn finalize_with_crc(payload_without_crc_tag: &str) -> String {
    let payload_for_crc = format!("{payload_without_crc_tag}6304");
    let crc = crc16::crc16_ccitt(payload_for_crc.as_bytes());
    format!("{payload_for_crc}{crc:04X}")
}

fn currency_amount_country_block(amount: Option<Money>) -> String {
    let mut s = format_tag("52", "0000"); // merchant category code, unclassified
    s += &format_tag("53", "764"); // THB
    if let Some(amount) = amount {
        if amount.is_positive() {
            s += &format_tag("54", &format!("{:.2}", amount.to_baht()));
        }
    }
    s += &format_tag("58", "TH");
    s
}

fn point_of_initiation(amount: Option<Money>) -> &'static str {
    match amount {
        Some(m) if m.is_positive() => "12", // dynamic
        _ => "11",                          // static
    }
}

fn merchant_name_city_block(merchant_name: &str, merchant_city: &str) -> String {
    let name: String = merchant_name.chars().take(25).collect();
    let city: String = merchant_city.chars().take(15).collect();
    let name = if name.is_empty() { "NA".to_string() } else { name };
    let city = if city.is_empty() {
        "BANGKOK".to_string()
    } else {
        city
    };
    format_tag("59", &name) + &format_tag("60", &city)
}

/// Builds a Tag 30 Bill Payment QR payload. `ref1` is required (the store
/// token); `ref2`/`ref3` are optional free references.
pub fn build_bill_payment_qr(
    biller_id: &str,
    ref1: &str,
    ref2: Option<&str>,
    ref3: Option<&str>,
    amount: Option<Money>,
    merchant_name: &str,
    merchant_city: &str,
) -> Result<String, ApiError> {
    if ref1.is_empty() {
        return Err(ApiError::Validation("ref1 is required".to_string()));
    }

    let biller_id_clean: String = biller_id.chars().filter(|c| c.is_ascii_digit()).collect();
    if biller_id_clean.is_empty() {
        return Err(ApiError::Validation(
            "biller_id must contain at least one digit".to_string(),
        ));
    }
    let biller_id_15 = if biller_id_clean.len() < 15 {
        format!("{:0>15}", biller_id_clean)
    } else {
        biller_id_clean[..15].to_string()
    };

    let mut merchant_info = format_tag("00", AID_BILL_PAYMENT);
    merchant_info += &format_tag("01", &biller_id_15);

    let ref1_trimmed: String = ref1.chars().take(20).collect();
    merchant_info += &format_tag("02", &ref1_trimmed);

    if let Some(ref2) = ref2.filter(|s| !s.is_empty()) {
        let ref2_trimmed: String = ref2.chars().take(25).collect();
        merchant_info += &format_tag("03", &ref2_trimmed);
    }
    if let Some(ref3) = ref3.filter(|s| !s.is_empty()) {
        let ref3_trimmed: String = ref3.chars().take(27).collect();
        merchant_info += &format_tag("04", &ref3_trimmed);
    }

    let mut payload = format_tag("00", "01");
    payload += &format_tag("01", point_of_initiation(amount));
    payload += &format_tag("30", &merchant_info);
    payload += &currency_amount_country_block(amount);
    payload += &merchant_name_city_block(merchant_name, merchant_city);

    Ok(finalize_with_crc(&payload))
}

/// Buyer identification carried in a BOT long-form Tag 62 additional-data
/// block. Used for invoice-grade receipts where the bank needs to attach
/// the payer's identity to the transfer, not just the store token.
pub struct BuyerInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postcode: String,
    pub country: String,
    pub income_type_code: String,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Carriage-return-delimited Tag 62 body: buyer name/address/city/province/
/// postcode/country/income-type, each truncated to its own width.
fn buyer_additional_data(buyer: &BuyerInfo) -> String {
    let fields = [
        truncate_chars(&buyer.name, 30),
        truncate_chars(&buyer.address, 70),
        truncate_chars(&buyer.city, 30),
        truncate_chars(&buyer.province, 30),
        truncate_chars(&buyer.postcode, 5),
        truncate_chars(&buyer.country, 30),
        truncate_chars(&buyer.income_type_code, 3),
    ];
    fields.join("\r")
}

/// Builds the BOT long-form Tag 30 Bill Payment QR: the standard bill
/// payment subtemplate plus a Tag 62 additional-data block carrying buyer
/// identification, capped at 362 characters total.
pub fn build_bill_payment_qr_long_form(
    biller_id: &str,
    ref1: &str,
    ref2: Option<&str>,
    ref3: Option<&str>,
    amount: Option<Money>,
    merchant_name: &str,
    merchant_city: &str,
    buyer: &BuyerInfo,
) -> Result<String, ApiError> {
    let base = build_bill_payment_qr(biller_id, ref1, ref2, ref3, amount, merchant_name, merchant_city)?;

    let additional_data_value = buyer_additional_data(buyer);
    if additional_data_value.len() > 99 {
        // The TLV length field is two decimal digits wide (max 99 bytes);
        // a buyer block filled out to every field's maximum width doesn't
        // fit under a single Tag 62 value.
        return Err(ApiError::Validation(
            "buyer additional data exceeds the 99-byte TLV value limit".to_string(),
        ));
    }

    // Splice the Tag 62 block in before the Tag 63 CRC header, then
    // recompute the CRC over the new, longer payload.
    let without_crc = &base[..base.len() - 8]; // drop "6304" + 4 hex digits
    let additional_data = format_tag("62", &additional_data_value);
    let payload = format!("{without_crc}{additional_data}");

    if payload.len() + 8 > 362 {
        return Err(ApiError::Validation(
            "BOT long-form payload exceeds 362 characters".to_string(),
        ));
    }

    Ok(finalize_with_crc(&payload))
}

/// Builds the BOT short-form Tag 30 Bill Payment QR: no merchant name/city
/// (Tag 59/60) and no Tag 62. BOT's published short-form budget is 62
/// characters, which assumes a short biller ID; a 15-digit biller ID
/// alone consumes most of that budget, so this builder doesn't hard-reject
/// on length -- it just omits every optional field the long form carries.
pub fn build_bill_payment_qr_short(
    biller_id: &str,
    ref1: &str,
    ref2: Option<&str>,
    ref3: Option<&str>,
    amount: Option<Money>,
) -> Result<String, ApiError> {
    if ref1.is_empty() {
        return Err(ApiError::Validation("ref1 is required".to_string()));
    }

    let biller_id_clean: String = biller_id.chars().filter(|c| c.is_ascii_digit()).collect();
    if biller_id_clean.is_empty() {
        return Err(ApiError::Validation(
            "biller_id must contain at least one digit".to_string(),
        ));
    }
    let biller_id_15 = if biller_id_clean.len() < 15 {
        format!("{:0>15}", biller_id_clean)
    } else {
        biller_id_clean[..15].to_string()
    };

    let mut merchant_info = format_tag("00", AID_BILL_PAYMENT);
    merchant_info += &format_tag("01", &biller_id_15);
    let ref1_trimmed: String = ref1.chars().take(20).collect();
    merchant_info += &format_tag("02", &ref1_trimmed);
    if let Some(ref2) = ref2.filter(|s| !s.is_empty()) {
        let ref2_trimmed: String = ref2.chars().take(25).collect();
        merchant_info += &format_tag("03", &ref2_trimmed);
    }
    if let Some(ref3) = ref3.filter(|s| !s.is_empty()) {
        let ref3_trimmed: String = ref3.chars().take(27).collect();
        merchant_info += &format_tag("04", &ref3_trimmed);
    }

    let mut payload = format_tag("00", "01");
    payload += &format_tag("01", point_of_initiation(amount));
    payload += &format_tag("30", &merchant_info);
    payload += &format_tag("52", "0000");
    payload += &format_tag("53", "764");
    if let Some(amount) = amount.filter(|a| a.is_positive()) {
        payload += &format_tag("54", &format!("{:.2}", amount.to_baht()));
    }
    payload += &format_tag("58", "TH");

    Ok(finalize_with_crc(&payload))
}

/// Builds a Tag 29 Credit Transfer QR payload.
pub fn build_credit_transfer_qr(
    target: &CreditTransferTarget,
    amount: Option<Money>,
    merchant_name: &str,
    merchant_city: &str,
) -> Result<String, ApiError> {
    let mut merchant_info = format_tag("00", AID_CREDIT_TRANSFER);

    match target {
        CreditTransferTarget::Mobile(mobile) => {
            let digits: String = mobile.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() != 10 {
                return Err(ApiError::Validation(
                    "mobile number must be 10 digits".to_string(),
                ));
            }
            let national = if let Some(stripped) = digits.strip_prefix('0') {
                format!("0066{stripped}")
            } else {
                format!("0066{digits}")
            };
            merchant_info += &format_tag("01", &national);
        }
        CreditTransferTarget::NationalId(id) => {
            let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() != 13 {
                return Err(ApiError::Validation(
                    "national ID must be 13 digits".to_string(),
                ));
            }
            merchant_info += &format_tag("02", &format!("000{digits}"));
        }
        CreditTransferTarget::EWallet(id) => {
            let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() != 15 {
                return Err(ApiError::Validation(
                    "e-wallet id must be 15 digits".to_string(),
                ));
            }
            merchant_info += &format_tag("03", &digits);
        }
    }

    let mut payload = format_tag("00", "01");
    payload += &format_tag("01", point_of_initiation(amount));
    payload += &format_tag("29", &merchant_info);
    payload += &currency_amount_country_block(amount);
    payload += &merchant_name_city_block(merchant_name, merchant_city);

    Ok(finalize_with_crc(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_payment_uses_distinct_aid_from_credit_transfer() {
        let bill =
            build_bill_payment_qr("000000000000099", "00100230004560000000", None, None, None, "Food Court", "BANGKOK")
                .unwrap();
        let credit = build_credit_transfer_qr(
            &CreditTransferTarget::Mobile("0812345678".to_string()),
            None,
            "NA",
            "BANGKOK",
        )
        .unwrap();

        assert!(bill.contains(AID_BILL_PAYMENT));
        assert!(!bill.contains(AID_CREDIT_TRANSFER));
        assert!(credit.contains(AID_CREDIT_TRANSFER));
        assert!(!credit.contains(AID_BILL_PAYMENT));
    }

    #[test]
    fn bill_payment_payload_ends_with_valid_crc() {
        let qr = build_bill_payment_qr(
            "000000000000099",
            "00100230004560000000",
            None,
            None,
            Some(Money::from_baht(100.0)),
            "Food Court",
            "BANGKOK",
        )
        .unwrap();

        let (body, crc_hex) = qr.split_at(qr.len() - 4);
        let expected = crc16::crc16_ccitt(format!("{body}").as_bytes());
        assert_eq!(format!("{expected:04X}"), crc_hex);
    }

    #[test]
    fn rejects_empty_ref1() {
        let err = build_bill_payment_qr("099", "", None, None, None, "NA", "BANGKOK").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_mobile_number() {
        let err = build_credit_transfer_qr(
            &CreditTransferTarget::Mobile("123".to_string()),
            None,
            "NA",
            "BANGKOK",
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn long_form_embeds_tag_62_and_recomputes_crc() {
        let buyer = BuyerInfo {
            name: "Somchai Jaidee".to_string(),
            address: "123 Sukhumvit Rd".to_string(),
            city: "Bangkok".to_string(),
            province: "Bangkok".to_string(),
            postcode: "10110".to_string(),
            country: "TH".to_string(),
            income_type_code: "001".to_string(),
        };
        let qr = build_bill_payment_qr_long_form(
            "000000000000099",
            "00100230004560000000",
            None,
            None,
            Some(Money::from_baht(100.0)),
            "Food Court",
            "BANGKOK",
            &buyer,
        )
        .unwrap();

        assert!(qr.contains("62"));
        assert!(qr.contains("Somchai"));
        let (body, crc_hex) = qr.split_at(qr.len() - 4);
        let expected = crc16::crc16_ccitt(body.as_bytes());
        assert_eq!(format!("{expected:04X}"), crc_hex);
        assert!(qr.len() <= 362);
    }

    #[test]
    fn short_form_omits_merchant_name_and_buyer_block() {
        let qr = build_bill_payment_qr_short(
            "000000000000099",
            "00100230004560000000",
            None,
            None,
            Some(Money::from_baht(20.0)),
        )
        .unwrap();

        assert!(!qr.contains(&format_tag("59", "NA")));
        assert!(!qr.contains('\r'));
    }

    #[test]
    fn static_payload_when_amount_missing_dynamic_when_present() {
        let static_qr =
            build_bill_payment_qr("099", "ref1", None, None, None, "NA", "BANGKOK").unwrap();
        let dynamic_qr = build_bill_payment_qr(
            "099",
            "ref1",
            None,
            None,
            Some(Money::from_baht(50.0)),
            "NA",
            "BANGKOK",
        )
        .unwrap();
        assert!(static_qr.contains("010211"));
        assert!(dynamic_qr.contains("010212"));
    }
}
