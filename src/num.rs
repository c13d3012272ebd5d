/// Format an offset as a fixed width, 20 digit number with `_` between every
/// 3 digits, e.g. `00_000_000_000_001_200_000`.
///
/// The output is 26 chars for every u64 and sorts the same way as the number,
/// which makes it usable as a segment file name.
pub(crate) fn format_pad_u64(n: u64) -> String {
    group_digits(&format!("{:020}", n))
}

/// Format a number with at least 9 digits, grouped by 3: `001_200_000`.
pub(crate) fn format_pad9_u64(n: u64) -> String {
    group_digits(&format!("{:09}", n))
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut s = String::with_capacity(len + len / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            s.push('_');
        }
        s.push(c);
    }
    s
}
