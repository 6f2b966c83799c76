/// Number to send a reply to, following the channel's numbering convention.
///
/// With `strip_digit_at = Some(i)` the digit at 0-based position `i` is
/// removed. Numbers too short for the position are returned unchanged.
pub fn normalize_recipient(number: &str, strip_digit_at: Option<usize>) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();

    match strip_digit_at {
        Some(position) if position < digits.len() => {
            let mut normalized = String::with_capacity(digits.len() - 1);
            normalized.push_str(&digits[..position]);
            normalized.push_str(&digits[position + 1..]);
            normalized
        }
        _ => digits,
    }
}
