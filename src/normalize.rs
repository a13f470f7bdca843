//! Extended-regex (`(?x)`) normalization.
//!
//! Rule authors may write patterns in extended syntax for readability:
//! insignificant whitespace and `#` comments outside character classes. The
//! portable engine does not accept free-spacing patterns wholesale, so this
//! module rewrites them into their compact equivalent before compilation.
//!
//! Normalization never fails; a malformed pattern is passed through and
//! surfaced by the compile step instead.

use std::borrow::Cow;

/// Rewrites a `(?x)` extended-syntax pattern into compact form.
///
/// Patterns without the literal `(?x)` token are returned unchanged
/// (borrowed). Otherwise the token is stripped and the pattern is walked one
/// code point at a time:
///
/// - outside character classes, Unicode whitespace is dropped and `#` starts
///   a comment running through the next line terminator;
/// - inside character classes (`[` .. `]`), every character is preserved
///   verbatim;
/// - a backslash escapes the following character in either context.
pub fn normalize_extended_regex(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("(?x)") {
        return Cow::Borrowed(pattern);
    }

    let stripped = pattern.replace("(?x)", "");
    let mut result = String::with_capacity(stripped.len());
    let mut in_char_class = false;
    let mut in_escape = false;
    let mut in_comment = false;

    for c in stripped.chars() {
        if in_comment {
            if c == '\n' || c == '\r' {
                in_comment = false;
            }
            continue;
        }
        if in_escape {
            result.push(c);
            in_escape = false;
            continue;
        }
        match c {
            '\\' => {
                result.push(c);
                in_escape = true;
            }
            '[' if !in_char_class => {
                result.push(c);
                in_char_class = true;
            }
            ']' if in_char_class => {
                result.push(c);
                in_char_class = false;
            }
            _ if in_char_class => result.push(c),
            '#' => in_comment = true,
            _ if c.is_whitespace() => {}
            _ => result.push(c),
        }
    }

    Cow::Owned(result)
}
