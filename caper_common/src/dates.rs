//! Lesson date helpers

/// Split a stored date value into its parts
///
/// A single date yields one part; a range such as
/// `04/01/2025 - 04/03/2025` yields one part per side. Empty parts are
/// dropped.
pub fn split_date_range(raw: &str) -> Vec<String> {
    raw.split('-')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert `M/D/YYYY` (one or two digit month/day) into `YYYY-MM-DD`
///
/// Anything that does not match is returned unchanged.
pub fn to_iso_date(raw: &str) -> String {
    let mut parts = raw.split('/');
    let (Some(mm), Some(dd), Some(yyyy), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return raw.to_string();
    };

    let digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };

    if !digits(mm, 1, 2) || !digits(dd, 1, 2) || !digits(yyyy, 4, 4) {
        return raw.to_string();
    }

    format!("{}-{:0>2}-{:0>2}", yyyy, mm, dd)
}
