//! EMV TLV tag formatting.

/// Formats a single EMV tag as `TTLLVV...`. The length is the number of
/// **bytes** the value encodes to, not its character count -- Thai
/// merchant names are multi-byte UTF-8 and a char-count length would
/// produce a payload that fails to scan.
pub fn format_tag(tag: &str, value: &str) -> String {
    let length = value.len(); // Rust `str::len` is already byte length.
    format!("{:0>2}{:0>2}{}", tag, length, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_tag_and_length_to_two_digits() {
        assert_eq!(format_tag("0", "01"), "000201");
    }

    #[test]
    fn length_counts_bytes_not_chars_for_thai_text() {
        let tagged = format_tag("59", "ร้านอาหาร");
        // "ร้านอาหาร" is 9 Thai characters but 27 UTF-8 bytes.
        assert!(tagged.starts_with("5927"));
    }
}
