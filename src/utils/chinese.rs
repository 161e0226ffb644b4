//! Chinese and mixed-width text utilities.

use std::sync::LazyLock;

use regex::Regex;

static BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]【】()（）{}<>《》]").expect("valid regex"));
static COMPARE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s._\-]+").expect("valid regex"));

/// Convert fullwidth ASCII variants (`Ｓ０１`, `４Ｋ`) and the ideographic space to halfwidth.
pub fn to_halfwidth(s: &str) -> String {
    s.chars()
        .map(|c| match c as u32 {
            0x3000 => ' ',
            code @ 0xFF01..=0xFF5E => char::from_u32(code - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Collapse every whitespace run (including NBSP) into a single space and trim.
pub fn normalize_spaces(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{00A0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of a single Chinese numeral character.
fn numeral_value(c: char) -> Option<u32> {
    let v = match c {
        '零' => 0,
        '一' => 1,
        '二' | '两' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        '十' => 10,
        _ => return None,
    };
    Some(v)
}

/// Convert a Chinese numeral (or plain digits) to an integer.
///
/// Handles `十`, `十X`, `X十`, `X十Y` and digit-by-digit forms such as `二零`.
pub fn chinese_to_int(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok();
    }

    let chars: Vec<char> = s.chars().collect();
    match chars.as_slice() {
        ['十'] => return Some(10),
        ['十', unit] => {
            if let Some(v) = numeral_value(*unit) {
                return Some(10 + v);
            }
        }
        [tens, '十'] => {
            if let Some(v) = numeral_value(*tens) {
                return Some(v * 10);
            }
        }
        [tens, '十', unit] => {
            if let (Some(t), Some(u)) = (numeral_value(*tens), numeral_value(*unit)) {
                return Some(t * 10 + u);
            }
        }
        _ => {}
    }

    chars.iter().try_fold(0u32, |acc, c| {
        let v = numeral_value(*c)?;
        acc.checked_mul(10)?.checked_add(v)
    })
}

/// Check if a string contains Chinese characters.
pub fn contains_chinese(s: &str) -> bool {
    s.chars().any(is_chinese_char)
}

/// Check if a character is a Chinese character.
fn is_chinese_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |  // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |  // CJK Unified Ideographs Extension A
        '\u{F900}'..='\u{FAFF}' |  // CJK Compatibility Ideographs
        '\u{20000}'..='\u{2A6DF}'  // CJK Unified Ideographs Extension B
    )
}

/// Loose title normalization for heuristic comparisons: lowercase, no separators, no brackets.
pub fn normalize_for_compare(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_separators = COMPARE_SEPARATORS.replace_all(&lowered, "");
    BRACKETS.replace_all(&no_separators, "").into_owned()
}

/// Case-insensitive edit-distance similarity: `1 - distance / max(len)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}
