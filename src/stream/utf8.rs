//! Streaming UTF-8 decoding
//!
//! Network chunks can end in the middle of a multi-byte character. The
//! decoder holds back the incomplete tail until the next chunk arrives.

/// Incremental UTF-8 decoder
///
/// Invalid sequences are replaced with U+FFFD, one replacement per maximal
/// invalid subpart, so a malformed byte never stalls the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of a character that was cut off by the previous chunk
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` and append the text to `out`.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            self.pending = Self::decode_complete(bytes, out).to_vec();
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            self.pending = Self::decode_complete(&joined, out).to_vec();
        }
    }

    /// Append every complete character of `bytes` to `out` and return the
    /// unfinished tail.
    fn decode_complete<'a>(mut bytes: &'a [u8], out: &mut String) -> &'a [u8] {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return &[];
                }
                Err(e) => {
                    let (valid, after) = bytes.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or(""));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            bytes = &after[invalid..];
                        }
                        None => return after,
                    }
                }
            }
        }
    }
}
