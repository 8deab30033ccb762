//! Incremental extraction of JSON objects from an undelimited byte stream.
//!
//! Some upstreams "stream" by writing `{"response":"a"}{"response":"b"}...`
//! with no separators, and chunk boundaries fall anywhere, including inside
//! strings and escape sequences. [`JsonObjectScanner`] tracks brace depth
//! outside strings and yields each top-level object once its closing brace
//! arrives.

use serde_json::Value;
use smallvec::SmallVec;

/// Objects completed by one [`JsonObjectScanner::feed`] call.
pub type ScannedObjects = SmallVec<[Value; 4]>;

#[derive(Debug, Default)]
pub struct JsonObjectScanner {
    buffer: Vec<u8>,
    /// Next unscanned byte in `buffer`.
    cursor: usize,
    /// Start of the object currently open at depth 1.
    object_start: Option<usize>,
    depth: u32,
    in_string: bool,
    escaped: bool,
    discarded: usize,
}

impl JsonObjectScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every object it completed, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> ScannedObjects {
        let mut out = ScannedObjects::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Like [`JsonObjectScanner::feed`], appending into `out`.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut ScannedObjects) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(chunk);

        let len = self.buffer.len();
        let mut i = self.cursor;
        while i < len {
            if self.depth == 0 {
                // Only an opening brace matters between objects.
                match memchr::memchr(b'{', &self.buffer[i..]) {
                    Some(offset) => {
                        i += offset;
                        self.object_start = Some(i);
                        self.depth = 1;
                        i += 1;
                    }
                    None => {
                        i = len;
                    }
                }
                continue;
            }

            let byte = self.buffer[i];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                i += 1;
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        if let Some(start) = self.object_start.take() {
                            self.emit(start, i + 1, out);
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        self.cursor = len;
        self.compact();
    }

    /// Discard any incomplete trailing object and reset.
    ///
    /// Returns the number of malformed or incomplete objects dropped over
    /// the scanner's lifetime.
    pub fn finish(&mut self) -> usize {
        if self.object_start.is_some() {
            self.discarded += 1;
            tracing::debug!(
                pending_bytes = self.buffer.len(),
                "discarding incomplete trailing JSON object"
            );
        }
        self.buffer.clear();
        self.cursor = 0;
        self.object_start = None;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        self.discarded
    }

    /// Bytes still held for an unfinished object.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn emit(&mut self, start: usize, end: usize, out: &mut ScannedObjects) {
        match serde_json::from_slice::<Value>(&self.buffer[start..end]) {
            Ok(value) => out.push(value),
            Err(err) => {
                self.discarded += 1;
                tracing::debug!(error = %err, "skipping unparseable streamed object");
            }
        }
    }

    fn compact(&mut self) {
        let keep_from = self.object_start.unwrap_or(self.buffer.len());
        if keep_from == 0 {
            return;
        }
        self.buffer.drain(..keep_from);
        self.cursor -= keep_from;
        if let Some(start) = self.object_start.as_mut() {
            *start -= keep_from;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STREAM: &[u8] =
        br#"{"response":"Hel"}{"response":"lo, \"w"}{"response":"orld\\"}{"response":"{}"}"#;

    fn expected() -> Vec<Value> {
        vec![
            json!({"response": "Hel"}),
            json!({"response": "lo, \"w"}),
            json!({"response": "orld\\"}),
            json!({"response": "{}"}),
        ]
    }

    #[test]
    fn test_single_chunk_yields_all_objects() {
        let mut scanner = JsonObjectScanner::new();
        let values = scanner.feed(STREAM);
        assert_eq!(values.to_vec(), expected());
        assert_eq!(scanner.pending_len(), 0);
    }

    #[test]
    fn test_every_split_point_yields_same_objects() {
        for split in 0..=STREAM.len() {
            let mut scanner = JsonObjectScanner::new();
            let mut values = scanner.feed(&STREAM[..split]).to_vec();
            values.extend(scanner.feed(&STREAM[split..]));
            assert_eq!(values, expected(), "split at {split}");
        }
    }

    #[test]
    fn test_byte_by_byte_feed() {
        let mut scanner = JsonObjectScanner::new();
        let mut values = Vec::new();
        for byte in STREAM {
            values.extend(scanner.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(values, expected());
        assert_eq!(scanner.finish(), 0);
    }

    #[test]
    fn test_chunk_ending_on_backslash() {
        let mut scanner = JsonObjectScanner::new();
        assert!(scanner.feed(br#"{"response":"a\"#).is_empty());
        let values = scanner.feed(br#""b"}"#);
        assert_eq!(values.to_vec(), vec![json!({"response": "a\"b"})]);
    }

    #[test]
    fn test_noise_between_objects_is_ignored() {
        let mut scanner = JsonObjectScanner::new();
        let values = scanner.feed(b"\n} ]junk{\"a\":1}\r\n , {\"b\":{\"c\":2}}");
        assert_eq!(values.to_vec(), vec![json!({"a": 1}), json!({"b": {"c": 2}})]);
    }

    #[test]
    fn test_unparseable_object_is_skipped() {
        let mut scanner = JsonObjectScanner::new();
        let values = scanner.feed(br#"{"a":}{"b":2}"#);
        assert_eq!(values.to_vec(), vec![json!({"b": 2})]);
        assert_eq!(scanner.finish(), 1);
    }

    #[test]
    fn test_finish_discards_incomplete_tail() {
        let mut scanner = JsonObjectScanner::new();
        let values = scanner.feed(br#"{"response":"done"}{"response":"cut"#);
        assert_eq!(values.len(), 1);
        assert!(scanner.pending_len() > 0);
        assert_eq!(scanner.finish(), 1);
        assert_eq!(scanner.pending_len(), 0);
        assert!(scanner.feed(b"\"}").is_empty());
    }
}
