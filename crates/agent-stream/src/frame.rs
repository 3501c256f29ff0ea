//! Reassembly of a chunked byte stream into SSE data records.
//!
//! Network chunks split records at arbitrary points (including inside a
//! multi-byte character), so both the byte-to-text step and the line step
//! keep an unresolved remainder that is carried into the next chunk.

/// Prefix marking a meaningful SSE line.
pub const DATA_PREFIX: &str = "data:";

const LINE_TERMINATOR: char = '\n';

/// Result of one [`append`] pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Split {
    /// Complete `data:` records, in stream order.
    pub records: Vec<String>,
    /// Text not yet resolved into a record.
    pub carry: String,
}

/// Joins `carry` and `chunk` and splits the result into complete records.
///
/// Every segment followed by a terminator is a candidate record. Candidates
/// that do not start with [`DATA_PREFIX`] are folded back into the carry with
/// their terminator restored; blank ones (including a lone `\r` from CRLF
/// framing) are dropped. The final segment is
/// always kept as carry, whether or not it looks complete.
pub fn append(carry: &str, chunk: &str) -> Split {
    let joined = format!("{carry}{chunk}");
    let mut segments: Vec<&str> = joined.split(LINE_TERMINATOR).collect();
    let tail = segments.pop().unwrap_or_default();

    let mut split = Split::default();
    for segment in segments {
        if segment.starts_with(DATA_PREFIX) {
            split.records.push(segment.to_string());
        } else if !is_blank(segment) {
            split.carry.push_str(segment);
            split.carry.push(LINE_TERMINATOR);
        }
    }
    split.carry.push_str(tail);
    split
}

fn is_blank(segment: &str) -> bool {
    segment.trim_end_matches('\r').is_empty()
}

/// Resolves a final carry at end of stream.
///
/// No more input can arrive, so every remaining `data:` line is complete,
/// including one without a trailing terminator.
pub fn flush(carry: &str) -> Vec<String> {
    carry
        .split(LINE_TERMINATOR)
        .filter(|segment| segment.starts_with(DATA_PREFIX))
        .map(ToOwned::to_owned)
        .collect()
}

/// Stateful wrapper over [`append`]/[`flush`] that also decodes bytes.
///
/// The carry is kept in two parts. `settled` holds complete non-data lines,
/// which no later chunk can turn into a record, so only `tail` (the
/// unterminated last segment) is rescanned when a chunk arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    text: Utf8Decoder,
    settled: String,
    tail: String,
}

impl FrameBuffer {
    /// Feeds one raw chunk and returns the records it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.text.decode(chunk);
        self.push_text(&text)
    }

    /// Feeds already-decoded text.
    pub fn push_text(&mut self, text: &str) -> Vec<String> {
        let split = append(&self.tail, text);
        let boundary = split
            .carry
            .rfind(LINE_TERMINATOR)
            .map_or(0, |idx| idx + LINE_TERMINATOR.len_utf8());
        self.settled.push_str(&split.carry[..boundary]);
        self.tail = split.carry[boundary..].to_string();
        split.records
    }

    /// Ends the stream, returning any records still held in the carry.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = self.text.finish();
        if !rest.is_empty() {
            self.tail.push_str(&rest);
        }
        // settled lines never carry the data prefix
        let records = flush(&self.tail);
        self.settled.clear();
        self.tail.clear();
        records
    }

    /// Unresolved text carried into the next chunk.
    pub fn carry(&self) -> String {
        format!("{}{}", self.settled, self.tail)
    }
}

/// Incremental UTF-8 decoding that holds back a trailing partial sequence.
///
/// Invalid bytes are replaced with U+FFFD rather than failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    // valid_up_to always lands on a char boundary
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Flushes a dangling partial sequence at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        "data: {\"type\":\"model\",\"content\":\"Hi\"}\n\n",
        "data: {\"type\":\"tool\",\"content\":\"工具返回: 42\"}\n\n",
        "data: {\"type\":\"result\",\"result\":\"Done\"}\n\n",
        "data: [DONE]\n\n",
    );

    fn records_in_chunks(bytes: &[u8], sizes: &[usize]) -> Vec<String> {
        let mut buffer = FrameBuffer::default();
        let mut records = Vec::new();
        let mut rest = bytes;
        let mut i = 0;
        while !rest.is_empty() {
            let size = sizes[i % sizes.len()].min(rest.len());
            let (chunk, tail) = rest.split_at(size);
            records.extend(buffer.push_chunk(chunk));
            rest = tail;
            i += 1;
        }
        records.extend(buffer.finish());
        records
    }

    #[test]
    fn append_keeps_last_segment_as_carry() {
        let split = append("", "data: one\ndata: tw");
        assert_eq!(split.records, vec!["data: one"]);
        assert_eq!(split.carry, "data: tw");

        let split = append(&split.carry, "o\n");
        assert_eq!(split.records, vec!["data: two"]);
        assert_eq!(split.carry, "");
    }

    #[test]
    fn append_folds_non_data_lines_into_carry() {
        let split = append("", "data: {\"content\":\"a\nb\"}\n\ndata: x");
        assert_eq!(split.records, vec!["data: {\"content\":\"a"]);
        assert_eq!(split.carry, "b\"}\ndata: x");
    }

    #[test]
    fn crlf_blank_lines_are_dropped() {
        let split = append("", "data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(split.records, vec!["data: one\r", "data: two\r"]);
        assert_eq!(split.carry, "");
    }

    #[test]
    fn settled_lines_are_kept_without_blocking_records() {
        let mut buffer = FrameBuffer::default();
        for _ in 0..100 {
            assert!(buffer.push_text(": ping\n\n").is_empty());
        }
        assert_eq!(buffer.carry(), ": ping\n".repeat(100));
        assert_eq!(buffer.push_text("data: {\"content\":\"x\"}\n"), vec!["data: {\"content\":\"x\"}"]);
        assert_eq!(buffer.push_text("data: [DO"), Vec::<String>::new());
        assert!(buffer.carry().ends_with("\ndata: [DO"));
        assert_eq!(buffer.finish(), vec!["data: [DO"]);
    }

    #[test]
    fn buffered_carry_matches_the_pure_split() {
        let chunks = ["note\ndata: a", "bc\n\r\n: keep", "alive\ndata: z"];
        let mut buffer = FrameBuffer::default();
        let mut carry = String::new();
        for chunk in chunks {
            let split = append(&carry, chunk);
            assert_eq!(buffer.push_text(chunk), split.records);
            carry = split.carry;
            assert_eq!(buffer.carry(), carry);
        }
        assert_eq!(buffer.finish(), flush(&carry));
    }

    #[test]
    fn reassembly_is_independent_of_chunk_boundaries() {
        let whole = records_in_chunks(STREAM.as_bytes(), &[STREAM.len()]);
        assert_eq!(whole.len(), 4);
        for sizes in [&[1][..], &[2, 5], &[7, 3, 11], &[13]] {
            assert_eq!(records_in_chunks(STREAM.as_bytes(), sizes), whole, "{sizes:?}");
        }
    }

    #[test]
    fn finish_yields_record_without_trailing_newline() {
        let mut buffer = FrameBuffer::default();
        assert!(buffer.push_text("data: [DONE]").is_empty());
        assert_eq!(buffer.finish(), vec!["data: [DONE]"]);
        assert_eq!(buffer.carry(), "");
    }

    #[test]
    fn utf8_sequences_split_across_chunks_are_preserved() {
        let bytes = "返回".as_bytes();
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..4]), "返");
        assert_eq!(decoder.decode(&bytes[4..]), "回");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
        assert_eq!(decoder.decode(&[0xe8]), "");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }
}
