/// Inclusive byte window of a partial-content response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a file of `file_size` bytes.
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

/// Parses a `Range: bytes=start-end?` header against the file size. The
/// open end defaults to the last byte and an overlong end is clipped to it.
/// Anything unparseable or unsatisfiable yields `None`, and the caller
/// falls back to a full 200 response.
pub fn parse(header: &str, file_size: u64) -> Option<ByteRange> {
    if file_size == 0 {
        return None;
    }
    let spec = header.strip_prefix("bytes=")?;
    let (start_raw, end_raw) = spec.split_once('-')?;
    let start: u64 = start_raw.trim().parse().ok()?;
    let end: u64 = match end_raw.trim() {
        "" => file_size - 1,
        raw => raw.parse::<u64>().ok()?.min(file_size - 1),
    };
    if start > end {
        return None;
    }
    Some(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_window_parses() {
        let range = parse("bytes=100-199", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 100, end: 199 });
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(1000), "bytes 100-199/1000");
    }

    #[test]
    fn open_end_runs_to_last_byte() {
        let range = parse("bytes=950-", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 950, end: 999 });
        assert_eq!(range.len(), 50);
    }

    #[test]
    fn overlong_end_is_clipped() {
        let range = parse("bytes=0-5000", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 999 });
    }

    #[test]
    fn unsatisfiable_or_garbage_yields_none() {
        assert_eq!(parse("bytes=1000-1100", 1000), None);
        assert_eq!(parse("bytes=200-100", 1000), None);
        assert_eq!(parse("bytes=-500", 1000), None);
        assert_eq!(parse("items=0-10", 1000), None);
        assert_eq!(parse("bytes=abc-def", 1000), None);
        assert_eq!(parse("bytes=0-10", 0), None);
    }

    #[test]
    fn single_byte_window() {
        let range = parse("bytes=0-0", 1000).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.content_range(1000), "bytes 0-0/1000");
    }
}
