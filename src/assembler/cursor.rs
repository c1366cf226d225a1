//! Small hand-rolled scanning helpers mirroring the reference's
//! `SKIP_BLANK`/`SKIP_TOKEN`/`match` macros, operating on a `&mut &str`
//! "cursor" the way the source threads a `char **str` through every parser.

pub fn skip_blank(s: &mut &str) {
    *s = s.trim_start_matches([' ', '\t']);
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || c == '.'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Consume one identifier token (if the cursor is positioned at one) and
/// return its text. Leaves the cursor untouched and returns "" if not
/// positioned at an identifier start.
pub fn take_token<'a>(s: &mut &'a str) -> &'a str {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => {}
        _ => return "",
    }
    let mut end = s.len();
    for (i, c) in chars {
        if !is_ident_char(c) {
            end = i;
            break;
        }
    }
    let (tok, rest) = s.split_at(end);
    *s = rest;
    tok
}

/// Skip blanks, then consume `c` if present. Matches the reference's `match()`.
pub fn match_char(s: &mut &str, c: char) -> bool {
    skip_blank(s);
    if s.starts_with(c) {
        *s = &s[c.len_utf8()..];
        true
    } else {
        false
    }
}

pub fn peek_char(s: &str) -> Option<char> {
    s.chars().next()
}
