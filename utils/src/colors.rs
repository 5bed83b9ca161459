//! Legacy color codes.
//!
//! Configured messages use `&c`-style codes because the section sign is
//! awkward to type; hosts expect `§c`.

pub const COLOR_CHAR: char = '\u{a7}';

const ALT_COLOR_CHAR: char = '&';
const CODES: &str = "0123456789abcdefklmnorx";

/// Replace `&<code>` with `§<code>` for every recognised code character.
///
/// Unrecognised sequences such as `&&` or `& ` are left as they are.
#[must_use]
pub fn translate_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == ALT_COLOR_CHAR
            && let Some(&next) = chars.peek()
            && CODES.contains(next.to_ascii_lowercase())
        {
            out.push(COLOR_CHAR);
            out.push(next.to_ascii_lowercase());
            chars.next();
            continue;
        }
        out.push(ch);
    }

    out
}

/// Drop `§<code>` pairs, e.g. before printing to a plain terminal.
#[must_use]
pub fn strip_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch == COLOR_CHAR {
            chars.next();
            continue;
        }
        out.push(ch);
    }

    out
}
