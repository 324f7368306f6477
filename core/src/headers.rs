//! HTTP header/body utilities.
//!
//! These are normally provided by an external collaborator on the raw
//! byte slice (a `Header`/`Body` contract that this crate consumes but
//! does not define). Nothing in this workspace's dependency stack
//! supplies it, so it is implemented here directly against `httparse`'s
//! header-scan primitives, following the same lowercase-name matching
//! [`crate`]'s teacher uses when pulling well-known headers out of a
//! parsed request/response.

use memchr::memmem;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const MAX_HEADERS: usize = 32;

/// Returns the bytes of `buf` after the first `\r\n\r\n`, or an empty
/// slice if none is present.
pub fn body_slice(buf: &[u8]) -> &[u8] {
    match memmem::find(buf, HEADER_TERMINATOR) {
        Some(pos) => &buf[pos + HEADER_TERMINATOR.len()..],
        None => &[],
    }
}

/// Returns the whitespace-trimmed value of header `name` in `buf`
/// (case-insensitive), or an empty slice if the header is absent or no
/// header terminator has been observed yet.
///
/// `buf` is expected to start with a request or status line followed
/// by `name: value\r\n` header lines, as `httparse` parses it; only the
/// portion up to (and including) the header terminator is scanned.
pub fn header_value<'a>(buf: &'a [u8], name: &str) -> &'a [u8] {
    let header_end = match memmem::find(buf, HEADER_TERMINATOR) {
        Some(pos) => pos + HEADER_TERMINATOR.len(),
        None => return &[],
    };
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    // httparse::parse_headers expects the buffer to start just past the
    // request/status line, at the first header line.
    let line_start = match memmem::find(&buf[..header_end], b"\r\n") {
        Some(pos) => pos + 2,
        None => return &[],
    };
    let parsed = match httparse::parse_headers(&buf[line_start..header_end], &mut headers) {
        Ok(httparse::Status::Complete((_, hdrs))) => hdrs,
        _ => return &[],
    };
    for hdr in parsed {
        if hdr.name.eq_ignore_ascii_case(name) {
            return trim(hdr.value);
        }
    }
    &[]
}

fn trim(value: &[u8]) -> &[u8] {
    let start = value.iter().position(|b| !b.is_ascii_whitespace());
    let end = value.iter().rposition(|b| !b.is_ascii_whitespace());
    match (start, end) {
        (Some(s), Some(e)) => &value[s..=e],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_slice_after_terminator() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nhello";
        assert_eq!(body_slice(buf), b"hello");
    }

    #[test]
    fn body_slice_no_terminator() {
        let buf = b"GET / HTTP/1.1\r\nHost: x";
        assert_eq!(body_slice(buf), b"");
    }

    #[test]
    fn header_value_found_and_trimmed() {
        let buf = b"POST /u HTTP/1.1\r\nHost: x\r\nContent-Length:  5 \r\n\r\nhello";
        assert_eq!(header_value(buf, "content-length"), b"5");
        assert_eq!(header_value(buf, "Host"), b"x");
    }

    #[test]
    fn header_value_absent() {
        let buf = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert_eq!(header_value(buf, "Expect"), b"");
    }
}
