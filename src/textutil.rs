use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("markup regex"));

pub const RANGE_DASHES: &[char] = &['–', '—', '-', '~', '～', '－'];

// Capitalized only: lowercase "may" is far more often the modal verb than the month.
const MONTHS: &[(&str, &str)] = &[
    ("January", "1"),
    ("Jan", "1"),
    ("February", "2"),
    ("Feb", "2"),
    ("March", "3"),
    ("Mar", "3"),
    ("April", "4"),
    ("Apr", "4"),
    ("May", "5"),
    ("June", "6"),
    ("Jun", "6"),
    ("July", "7"),
    ("Jul", "7"),
    ("August", "8"),
    ("Aug", "8"),
    ("September", "9"),
    ("Sept", "9"),
    ("Sep", "9"),
    ("October", "10"),
    ("Oct", "10"),
    ("November", "11"),
    ("Nov", "11"),
    ("December", "12"),
    ("Dec", "12"),
];

static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    let mut names: Vec<&str> = MONTHS.iter().map(|(name, _)| *name).collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()));
    Regex::new(&format!(r"\b({})\b", names.join("|"))).expect("month regex")
});

#[must_use]
pub fn norm_ws(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

pub fn strip_markup(text: &str) -> Cow<'_, str> {
    MARKUP_RE.replace_all(text, "")
}

/// Strip markup, then replace English month names with their month number
/// so that `May–Jun` lines up with `5-6月`. Only month-shaped occurrences are
/// replaced; the modal in `May be confused with` stays a word.
#[must_use]
pub fn normalize_months(text: &str) -> String {
    let plain = strip_markup(text);
    MONTH_RE
        .replace_all(&plain, |caps: &Captures| match caps.get(1) {
            Some(m) if month_shaped(&plain, m.start(), m.end()) => {
                month_number(m.as_str()).to_string()
            }
            _ => caps[0].to_string(),
        })
        .into_owned()
}

// Next to a range dash, or followed by a period, list punctuation, a digit or the end.
fn month_shaped(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();
    before.ends_with(|c: char| RANGE_DASHES.contains(&c))
        || after.is_empty()
        || after.starts_with(|c: char| {
            RANGE_DASHES.contains(&c) || matches!(c, '.' | ',' | ';' | ')') || c.is_ascii_digit()
        })
}

fn month_number(name: &str) -> &'static str {
    MONTHS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, num)| *num)
        .unwrap_or("")
}

#[inline]
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    let s = norm_ws(text);
    if s.chars().count() <= max_chars {
        return s;
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_ws_collapses_and_trims() {
        assert_eq!(norm_ws("  Leaves\t\tovate,\n apex  acute. "), "Leaves ovate, apex acute.");
        assert_eq!(norm_ws(" \u{3000} "), "");
    }

    #[test]
    fn strip_markup_keeps_inner_text() {
        assert_eq!(strip_markup("<i>Rosa</i> multi<b>flora</b><br/>"), "Rosa multiflora");
    }

    #[test]
    fn months_become_numbers() {
        assert_eq!(normalize_months("Fl. May–Jun., fr. Aug-October."), "Fl. 5–6., fr. 8-10.");
        assert_eq!(normalize_months("<i>Fl.</i> Sept"), "Fl. 9");
    }

    #[test]
    fn months_ignore_lowercase_and_embedded_words() {
        assert_eq!(normalize_months("petals may be absent"), "petals may be absent");
        assert_eq!(normalize_months("Martius; Decaisne"), "Martius; Decaisne");
    }

    #[test]
    fn months_need_month_shaped_context() {
        assert_eq!(
            normalize_months("May be confused with R. alba."),
            "May be confused with R. alba."
        );
        assert_eq!(normalize_months("Fl. Apr, May and Jun"), "Fl. 4, May and 6");
        assert_eq!(normalize_months("Fr. Oct – Nov 1915"), "Fr. 10 – 11 1915");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("叶长3-5厘米", 4), "叶长3-…");
        assert_eq!(preview("short  text", 20), "short text");
    }
}
