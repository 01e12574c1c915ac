//! Line framing: the one shared rule for all read-side truncation.
//!
//! A reader only ever hands back whole records. `truncate_at_last_newline`
//! is the single place that decides where a byte slice may be cut.

/// Outcome of searching a buffer for a final newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framed<'a> {
    /// The buffer (or a prefix of it) ends at a newline; `head` ends with
    /// `\n` and `tail` holds whatever followed it.
    Ok {
        /// Bytes up to and including the last newline.
        head: &'a [u8],
        /// Bytes after the last newline, if any.
        tail: &'a [u8],
    },
    /// No newline was found anywhere in the buffer.
    NoNewline,
}

/// Split `buf` at its last newline.
///
/// An empty buffer, or one that already ends with `\n`, is returned
/// whole with an empty tail. Otherwise the last `\n` is located and the
/// buffer is split immediately after it; if no `\n` exists at all,
/// `Framed::NoNewline` is returned and the caller must not emit anything.
pub fn truncate_at_last_newline(buf: &[u8]) -> Framed<'_> {
    if buf.is_empty() || buf.last() == Some(&b'\n') {
        return Framed::Ok { head: buf, tail: &[] };
    }

    match buf.iter().rposition(|&b| b == b'\n') {
        Some(pos) => Framed::Ok {
            head: &buf[..=pos],
            tail: &buf[pos + 1..],
        },
        None => Framed::NoNewline,
    }
}
