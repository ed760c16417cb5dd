//! Percent-decoding for event payloads
//!
//! The server escapes `%`, `\n` and `\r` inside `data:` lines. This is not
//! real URL encoding: every other character passes through, and unknown
//! escapes are kept as they are.

use std::borrow::Cow;

/// Undo the server's escaping of `%25`, `%0A` and `%0D`.
///
/// Any other `%` sequence, including a `%` at the very end, is copied
/// through unchanged. Input without a `%` is returned borrowed.
pub fn decode(raw: &str) -> Cow<'_, str> {
    let Some(first) = raw.find('%') else {
        return Cow::Borrowed(raw);
    };

    let mut decoded = String::with_capacity(raw.len());
    decoded.push_str(&raw[..first]);

    let mut rest = &raw[first..];
    while let Some(percent) = rest.find('%') {
        decoded.push_str(&rest[..percent]);

        // The escape spans three UTF-16 code units starting at the '%'. A
        // character straddling that boundary is copied along with it.
        let escape = &rest[percent..];
        let mut units = 0;
        let end = escape
            .char_indices()
            .find(|&(_, c)| {
                let past = units >= 3;
                units += c.len_utf16();
                past
            })
            .map_or(escape.len(), |(index, _)| index);
        let (encoded, tail) = escape.split_at(end);

        match encoded {
            "%25" => decoded.push('%'),
            "%0A" => decoded.push('\n'),
            "%0D" => decoded.push('\r'),
            other => decoded.push_str(other),
        }
        rest = tail;
    }
    decoded.push_str(rest);

    Cow::Owned(decoded)
}
