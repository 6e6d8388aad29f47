use futures_util::stream::{self, Stream, StreamExt};

/// Incremental UTF-8 decoder for chunked response bodies.
///
/// A character whose bytes straddle two chunks is held back until the rest of
/// it arrives. Invalid sequences become U+FFFD, one per maximal invalid subpart.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` on top of whatever was held back from the previous call.
    /// Returns an empty string when the chunk only extends an unfinished character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Bytes still waiting for the rest of their character.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Ends the stream. A truncated trailing character decodes to U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(char::REPLACEMENT_CHARACTER.to_string())
        }
    }
}

/// Turns a stream of byte buffers into a stream of decoded text, one item per
/// buffer that yields text, in arrival order.
///
/// The first error ends the stream.
pub fn decode_text_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let state = Some((Box::pin(bytes), Utf8StreamDecoder::new()));
    stream::unfold(state, |state| async move {
        let (mut bytes, mut decoder) = state?;
        loop {
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    let text = decoder.decode(chunk.as_ref());
                    if !text.is_empty() {
                        return Some((Ok(text), Some((bytes, decoder))));
                    }
                }
                Some(Err(e)) => return Some((Err(e), None)),
                None => return decoder.finish().map(|tail| (Ok(tail), None)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures_util::stream::TryStreamExt;

    use super::*;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, String>> {
        stream::iter(parts.iter().map(|p| Ok(p.to_vec())).collect::<Vec<_>>())
    }

    #[test]
    fn ascii_chunks_pass_through() {
        let mut decoder = Utf8StreamDecoder::new();
        let out: Vec<String> = ["Hel", "lo, ", "wor", "ld"]
            .iter()
            .map(|c| decoder.decode(c.as_bytes()))
            .collect();
        assert_eq!(out, ["Hel", "lo, ", "wor", "ld"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn split_character_is_carried_over() {
        // "ñ" is 0xC3 0xB1
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"Espa\xC3"), "Espa");
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.decode(b"\xB1a"), "ña");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn four_byte_character_across_three_chunks() {
        let bytes = "💸".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..3]), "");
        assert_eq!(decoder.decode(&bytes[3..]), "💸");
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
        assert_eq!(decoder.decode(b"\xC3("), "\u{FFFD}(");
    }

    #[test]
    fn truncated_tail_is_flushed_on_finish() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ok\xE2\x82"), "ok");
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
        assert_eq!(decoder.finish(), None);
    }

    #[tokio::test]
    async fn stream_preserves_order_and_skips_empty_items() {
        let body = "Ahorro en México: 10 000 €";
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1;

        let decoded: Vec<String> =
            decode_text_stream(chunks(&[&bytes[..5], &bytes[5..split], &bytes[split..]]))
                .try_collect()
                .await
                .unwrap();

        assert_eq!(decoded.concat(), body);
        assert_eq!(decoded[0], "Ahorr");
        assert!(decoded.iter().all(|c| !c.is_empty()));
    }

    #[tokio::test]
    async fn stream_stops_after_first_error() {
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"uno ".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"dos".to_vec()),
        ];
        let items: Vec<Result<String, String>> =
            decode_text_stream(stream::iter(parts)).collect().await;

        assert_eq!(items, vec![Ok("uno ".to_string()), Err("connection reset".to_string())]);
    }
}
