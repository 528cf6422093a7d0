//! Newline escaping for inline header values
//!
//! `@` is doubled first, then each `\n` becomes [`NL_SENTINEL`]. Because an
//! escaped string never holds a lone `@` outside a sentinel, unescaping is
//! exact even for inputs that already contained the sentinel text.

/// Token standing in for a newline inside a header value
pub const NL_SENTINEL: &str = "@--NL--@";

const ESCAPE: char = '@';

/// Escape a value so it fits on one header line
pub fn escape_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ESCAPE => out.push_str("@@"),
            '\n' => out.push_str(NL_SENTINEL),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_newlines`]
///
/// A lone `@` that starts neither `@@` nor the sentinel is kept verbatim.
pub fn unescape_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(ESCAPE) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("@@") {
            out.push(ESCAPE);
            rest = &tail[2..];
        } else if tail.starts_with(NL_SENTINEL) {
            out.push('\n');
            rest = &tail[NL_SENTINEL.len()..];
        } else {
            out.push(ESCAPE);
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
