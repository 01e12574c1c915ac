//! Property-based tests for the line framer.
//!
//! Tests for:
//! - No-partial-record: every framed head is empty or ends with `\n`
//! - Append-preserves-content: head + tail reconstructs the input exactly

use chukcha::framing::{truncate_at_last_newline, Framed};
use proptest::prelude::*;

proptest! {
    /// Property: framing never emits a partial record.
    /// For all byte buffers, the framed head is either empty or ends with `\n`.
    #[test]
    fn framed_head_is_empty_or_newline_terminated(buf in prop::collection::vec(any::<u8>(), 0..4096)) {
        if let Framed::Ok { head, .. } = truncate_at_last_newline(&buf) {
            prop_assert!(head.is_empty() || head.last() == Some(&b'\n'));
        }
    }

    /// Property: framing preserves content.
    /// For all byte buffers with at least one `\n`, concatenating the
    /// returned head and tail reconstructs the original buffer exactly.
    #[test]
    fn head_and_tail_reconstruct_input(
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 1..8),
        trailing in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let mut buf = Vec::new();
        for record in &records {
            buf.extend_from_slice(record);
            buf.push(b'\n');
        }
        buf.extend_from_slice(&trailing);

        match truncate_at_last_newline(&buf) {
            Framed::Ok { head, tail } => {
                let mut reconstructed = head.to_vec();
                reconstructed.extend_from_slice(tail);
                prop_assert_eq!(reconstructed, buf);
            }
            // A non-empty `records` always plants at least one `\n` in
            // `buf`, so `NoNewline` can only arise when there were no
            // records to begin with and `trailing` itself has none.
            Framed::NoNewline => prop_assert!(records.is_empty()),
        }
    }

    /// Property: a buffer with no `\n` anywhere is reported as such, never
    /// silently truncated to something shorter.
    #[test]
    fn no_newline_buffers_report_no_newline(
        buf in prop::collection::vec(prop_oneof![0u8..b'\n', (b'\n' + 1)..=255u8], 0..256),
    ) {
        // The strategy above excludes the newline byte (0x0A), so buf never contains one.
        match truncate_at_last_newline(&buf) {
            Framed::NoNewline => prop_assert!(!buf.is_empty()),
            Framed::Ok { head, tail } => {
                // Only possible for the empty buffer, which is defined as whole.
                prop_assert!(buf.is_empty());
                prop_assert_eq!(head, tail);
                prop_assert!(head.is_empty());
            }
        }
    }
}
