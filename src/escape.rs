//! Literal-escape normalization applied to outgoing messages.
//!
//! Caller-supplied strings sometimes arrive with line-ending escapes
//! un-interpreted: the two characters `\` `r` instead of a real carriage
//! return. Protocols that are terminated by CRLF (SMTP, FTP, HTTP) silently
//! stall on such input, so [`normalize`] rewrites the literal pairs into
//! real control bytes before transmission.
//!
//! This is a pure function on bytes so it can be tested without a socket.

use std::borrow::Cow;

/// Rewrites literal `\r` and `\n` escape pairs into real CR/LF bytes.
///
/// Real control bytes pass through untouched. Returns a borrowed slice
/// when the input contains no escape pairs.
#[must_use]
pub fn normalize(input: &[u8]) -> Cow<'_, [u8]> {
    let has_escape = input
        .windows(2)
        .any(|pair| pair == b"\\r" || pair == b"\\n");
    if !has_escape {
        return Cow::Borrowed(input);
    }

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'\\' && i + 1 < input.len() {
            let replacement = match input[i + 1] {
                b'r' => Some(b'\r'),
                b'n' => Some(b'\n'),
                _ => None,
            };
            if let Some(byte) = replacement {
                out.push(byte);
                i += 2;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    Cow::Owned(out)
}
