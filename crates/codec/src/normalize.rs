//! Stock-code normalization for the Chinese A-share markets.

/// Normalize a raw stock code to `SH`/`SZ`/`BJ` + 6 digits.
///
/// Idempotent: already-prefixed codes pass through, bare 6-digit codes get
/// their exchange prefix from the leading digits, anything else is returned
/// trimmed and uppercased.
pub fn normalize_stock_code(code: &str) -> String {
    let code = code.trim().to_ascii_uppercase();

    if code.len() == 8 {
        let (prefix, digits) = code.split_at(2);
        if matches!(prefix, "SH" | "SZ" | "BJ") && digits.bytes().all(|b| b.is_ascii_digit()) {
            return code;
        }
    }

    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        // 60*/605*/68* main and STAR boards, 00*/300* main and ChiNext,
        // 8*/43*/83*/87* Beijing listings.
        if code.starts_with("60") || code.starts_with("68") {
            return format!("SH{code}");
        }
        if code.starts_with("00") || code.starts_with("300") {
            return format!("SZ{code}");
        }
        if code.starts_with('8') || code.starts_with("43") {
            return format!("BJ{code}");
        }
    }

    code
}

/// Market code for a normalized stock code: 1 for Shanghai, 0 otherwise.
pub fn market_code(normalized: &str) -> u16 {
    if normalized.starts_with("SH") {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_by_leading_digits() {
        let cases = [
            ("600000", "SH600000"),
            ("605001", "SH605001"),
            ("688981", "SH688981"),
            ("000001", "SZ000001"),
            ("300750", "SZ300750"),
            ("830799", "BJ830799"),
            ("430047", "BJ430047"),
            ("871981", "BJ871981"),
        ];
        for (input, want) in cases {
            assert_eq!(normalize_stock_code(input), want, "input {input}");
        }
    }

    #[test]
    fn keeps_existing_prefix() {
        assert_eq!(normalize_stock_code("SH600000"), "SH600000");
        assert_eq!(normalize_stock_code("sz000001"), "SZ000001");
        assert_eq!(normalize_stock_code(" bj830799 "), "BJ830799");
    }

    #[test]
    fn passes_through_unrecognized() {
        assert_eq!(normalize_stock_code("IX000300"), "IX000300");
        assert_eq!(normalize_stock_code("12345"), "12345");
        assert_eq!(normalize_stock_code(""), "");
    }

    #[test]
    fn idempotent() {
        for input in ["600000", "000001", "830799", "IX000300", " sh600000 "] {
            let once = normalize_stock_code(input);
            assert_eq!(normalize_stock_code(&once), once, "input {input}");
        }
    }

    #[test]
    fn market_code_from_prefix() {
        assert_eq!(market_code("SH600000"), 1);
        assert_eq!(market_code("SZ000001"), 0);
        assert_eq!(market_code("BJ830799"), 0);
    }
}
