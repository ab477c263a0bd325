//! Order number validation.

/// Returns true when `number` is a non-empty string of ASCII digits that passes
/// the Luhn checksum.
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_valid_numbers() {
        for number in ["9278923470", "12345678903", "346436439", "4100401111100062", "371449635398431", "0"] {
            assert!(is_valid(number), "{number} should pass");
        }
    }

    #[test]
    fn rejects_bad_checksums() {
        for number in ["9278923471", "12345678900", "79927398710"] {
            assert!(!is_valid(number), "{number} should fail");
        }
    }

    #[test]
    fn rejects_non_digits() {
        assert!(!is_valid(""));
        assert!(!is_valid("1234-5678"));
        assert!(!is_valid(" 12345678903"));
        assert!(!is_valid("١٢٣"));
    }

    #[test]
    fn handles_numbers_longer_than_i64() {
        // 30 digits; valid checksum.
        assert!(is_valid("123456789012345678901234567891"));
    }
}
