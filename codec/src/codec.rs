//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::message::{
    validate_field, ClientId, RelayMessage, FIELD_SEPARATOR, FRAME_END, MAX_FRAME_LEN,
    MAX_TEXT_LEN, MAX_USERNAME_LEN, TAG_ASSIGN_ID, TAG_CHAT, TAG_USERNAME,
};
use crate::result::{CodecError, CodecResult};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// A codec for the relay wire protocol, translating between [`RelayMessage`]
/// values and delimited textual frames.
///
/// `RelayCodec` is stateless apart from oversized-frame recovery and is
/// typically used through `tokio_util::codec::Framed` on both ends of a
/// connection. Each successful `encode` appends exactly one complete frame
/// to the output buffer, so a frame queued through a `Framed` sink is
/// written as one unit and frames from concurrent senders never interleave
/// at the byte level.
///
/// Decoding is strict: an unknown tag, a missing or oversized field, a
/// reserved byte inside a field, or a non-numeric identity all yield a
/// [`CodecError`] for that frame only. The offending frame is consumed
/// whole and the next call continues with the following frame; no failure
/// partially mutates caller state.
pub struct RelayCodec {
    decoder_state: DecoderState,
}

/// Decoder recovery state.
///
/// A frame that grows past [`MAX_FRAME_LEN`] without a terminator is
/// reported once as [`CodecError::FrameTooLong`]; the decoder then skips
/// input until the next terminator so the stream re-synchronizes on the
/// following frame boundary.
#[derive(Clone, Copy, Debug)]
enum DecoderState {
    /// Accumulating a frame
    Reading,
    /// Skipping the remainder of an oversized frame
    Discarding,
}

impl RelayCodec {
    /// Creates a new instance of `RelayCodec`.
    pub fn new() -> RelayCodec {
        RelayCodec::default()
    }
}

impl Default for RelayCodec {
    fn default() -> Self {
        Self {
            decoder_state: DecoderState::Reading,
        }
    }
}

impl Decoder for RelayCodec {
    /// Per-message decode failures are yielded as items rather than stream
    /// errors: `Framed` treats a `Decoder` error as terminal, and a single
    /// bad frame must never take the connection down with it. The stream
    /// error channel is reserved for transport I/O failures.
    type Item = CodecResult<RelayMessage>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.decoder_state {
                DecoderState::Discarding => {
                    match src.iter().position(|&b| b == FRAME_END) {
                        Some(pos) => {
                            src.advance(pos + 1);
                            self.decoder_state = DecoderState::Reading;
                        }
                        None => {
                            src.clear();
                            return Ok(None);
                        }
                    }
                }
                DecoderState::Reading => match src.iter().position(|&b| b == FRAME_END) {
                    Some(pos) => {
                        let frame = src.split_to(pos + 1);
                        return Ok(Some(parse_frame(&frame[..pos])));
                    }
                    None if src.len() >= MAX_FRAME_LEN => {
                        let len = src.len();
                        warn!(len, "discarding oversized frame");
                        src.clear();
                        self.decoder_state = DecoderState::Discarding;
                        return Ok(Some(Err(CodecError::FrameTooLong { len })));
                    }
                    None => return Ok(None),
                },
            }
        }
    }
}

impl Encoder<RelayMessage> for RelayCodec {
    type Error = CodecError;

    fn encode(&mut self, item: RelayMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(&item, dst)
    }
}

impl Encoder<&RelayMessage> for RelayCodec {
    type Error = CodecError;

    /// Encodes a `RelayMessage` as one complete frame.
    ///
    /// String fields are re-validated against their length bounds and the
    /// reserved bytes, and the frame is rejected outright on violation;
    /// nothing is written to `dst` for a rejected message.
    fn encode(&mut self, item: &RelayMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            RelayMessage::Chat { id, text } => {
                validate_field("text", text, MAX_TEXT_LEN)?;
                put_frame(dst, TAG_CHAT, *id, Some(text));
            }
            RelayMessage::Username { id, username } => {
                validate_field("username", username, MAX_USERNAME_LEN)?;
                if username.is_empty() {
                    return Err(CodecError::EmptyField { field: "username" });
                }
                put_frame(dst, TAG_USERNAME, *id, Some(username));
            }
            RelayMessage::AssignId { id } => {
                put_frame(dst, TAG_ASSIGN_ID, *id, None);
            }
        }
        Ok(())
    }
}

/// Append one `<tag>|<id>[|<field>]\n` frame to `dst`.
fn put_frame(dst: &mut BytesMut, tag: u8, id: ClientId, field: Option<&str>) {
    let id = id.as_u64().to_string();
    dst.reserve(3 + id.len() + field.map_or(0, |f| f.len() + 1));
    dst.put_u8(b'0' + tag);
    dst.put_u8(FIELD_SEPARATOR);
    dst.put_slice(id.as_bytes());
    if let Some(field) = field {
        dst.put_u8(FIELD_SEPARATOR);
        dst.put_slice(field.as_bytes());
    }
    dst.put_u8(FRAME_END);
}

/// Parse one complete frame (terminator already stripped).
fn parse_frame(line: &[u8]) -> CodecResult<RelayMessage> {
    let (tag_bytes, rest) = split_field(line);
    let tag = parse_tag(tag_bytes)?;
    match tag {
        TAG_CHAT => {
            let rest = rest.ok_or(CodecError::MissingField {
                tag,
                field: "identity",
            })?;
            let (id_bytes, text_bytes) = split_field(rest);
            let text_bytes = text_bytes.ok_or(CodecError::MissingField { tag, field: "text" })?;
            let id = parse_identity(id_bytes)?;
            let text = parse_text_field("text", text_bytes, MAX_TEXT_LEN)?;
            Ok(RelayMessage::Chat { id, text })
        }
        TAG_USERNAME => {
            let rest = rest.ok_or(CodecError::MissingField {
                tag,
                field: "identity",
            })?;
            let (id_bytes, name_bytes) = split_field(rest);
            let name_bytes = name_bytes.ok_or(CodecError::MissingField {
                tag,
                field: "username",
            })?;
            let id = parse_identity(id_bytes)?;
            let username = parse_text_field("username", name_bytes, MAX_USERNAME_LEN)?;
            if username.is_empty() {
                return Err(CodecError::EmptyField { field: "username" });
            }
            Ok(RelayMessage::Username { id, username })
        }
        TAG_ASSIGN_ID => {
            let id_bytes = rest.ok_or(CodecError::MissingField {
                tag,
                field: "identity",
            })?;
            let id = parse_identity(id_bytes)?;
            Ok(RelayMessage::AssignId { id })
        }
        _ => Err(CodecError::UnknownTag {
            tag: tag.to_string(),
        }),
    }
}

/// Split at the first field separator, if any.
fn split_field(bytes: &[u8]) -> (&[u8], Option<&[u8]>) {
    match bytes.iter().position(|&b| b == FIELD_SEPARATOR) {
        Some(pos) => (&bytes[..pos], Some(&bytes[pos + 1..])),
        None => (bytes, None),
    }
}

fn parse_tag(bytes: &[u8]) -> CodecResult<u8> {
    let lossy = || CodecError::UnknownTag {
        tag: String::from_utf8_lossy(bytes).into_owned(),
    };
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(lossy());
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(lossy)
}

/// Parse an identity field: a positive decimal integer.
fn parse_identity(bytes: &[u8]) -> CodecResult<ClientId> {
    let invalid = || CodecError::InvalidIdentity {
        field: String::from_utf8_lossy(bytes).into_owned(),
    };
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let value = std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(invalid)?;
    if value == 0 {
        return Err(invalid());
    }
    Ok(ClientId::new(value))
}

/// Parse a trailing string field, enforcing UTF-8, the length bound, and
/// the reserved-byte rule (a further separator inside the remainder means
/// the sender smuggled a reserved byte into the field).
fn parse_text_field(field: &'static str, bytes: &[u8], max: usize) -> CodecResult<String> {
    if bytes.contains(&FIELD_SEPARATOR) {
        return Err(CodecError::ReservedByte { field });
    }
    if bytes.len() > max {
        return Err(CodecError::FieldTooLong {
            field,
            len: bytes.len(),
            max,
        });
    }
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| CodecError::InvalidUtf8 { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `src` through the decoder and collect every outcome until the
    /// buffer runs dry.
    fn collect_all(codec: &mut RelayCodec, mut src: BytesMut) -> Vec<CodecResult<RelayMessage>> {
        let mut out = Vec::new();
        while let Ok(Some(result)) = codec.decode(&mut src) {
            out.push(result);
        }
        out
    }

    fn encode_one(msg: &RelayMessage) -> BytesMut {
        let mut codec = RelayCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(msg, &mut dst).unwrap();
        dst
    }

    #[test]
    fn encode_chat_frame_bytes() {
        let msg = RelayMessage::chat(ClientId::new(7), "hello").unwrap();
        assert_eq!(&encode_one(&msg)[..], b"1|7|hello\n");
    }

    #[test]
    fn encode_username_frame_bytes() {
        let msg = RelayMessage::username(ClientId::new(12), "alice").unwrap();
        assert_eq!(&encode_one(&msg)[..], b"2|12|alice\n");
    }

    #[test]
    fn encode_assign_id_frame_bytes() {
        let msg = RelayMessage::assign_id(ClientId::new(3));
        assert_eq!(&encode_one(&msg)[..], b"3|3\n");
    }

    #[test]
    fn encode_rejects_reserved_bytes_without_writing() {
        let mut codec = RelayCodec::new();
        let mut dst = BytesMut::new();
        let msg = RelayMessage::Chat {
            id: ClientId::new(1),
            text: "a|b".to_string(),
        };
        assert_eq!(
            codec.encode(&msg, &mut dst),
            Err(CodecError::ReservedByte { field: "text" })
        );
        assert!(dst.is_empty());
    }

    #[test]
    fn round_trip_all_message_kinds() {
        let messages = vec![
            RelayMessage::chat(ClientId::new(1), "hello world").unwrap(),
            RelayMessage::chat(ClientId::new(u64::MAX), "").unwrap(),
            RelayMessage::username(ClientId::new(42), "bob").unwrap(),
            RelayMessage::assign_id(ClientId::new(9000)),
        ];
        for msg in messages {
            let mut codec = RelayCodec::new();
            let src = encode_one(&msg);
            let decoded = collect_all(&mut codec, src);
            assert_eq!(decoded, vec![Ok(msg)]);
        }
    }

    #[test]
    fn decode_incomplete_frame_returns_none() {
        let mut codec = RelayCodec::new();
        let mut src = BytesMut::from(&b"1|7|hel"[..]);
        assert_eq!(codec.decode(&mut src), Ok(None));

        // The partial frame stays buffered until the terminator arrives.
        src.extend_from_slice(b"lo\n");
        assert_eq!(
            codec.decode(&mut src),
            Ok(Some(Ok(RelayMessage::chat(ClientId::new(7), "hello").unwrap())))
        );
    }

    #[test]
    fn decode_multiple_frames_in_one_buffer() {
        let mut codec = RelayCodec::new();
        let src = BytesMut::from(&b"3|1\n2|1|alice\n1|1|hi\n"[..]);
        let decoded = collect_all(&mut codec, src);
        assert_eq!(
            decoded,
            vec![
                Ok(RelayMessage::assign_id(ClientId::new(1))),
                Ok(RelayMessage::username(ClientId::new(1), "alice").unwrap()),
                Ok(RelayMessage::chat(ClientId::new(1), "hi").unwrap()),
            ]
        );
    }

    #[test]
    fn decode_unknown_tag_consumes_only_that_frame() {
        let mut codec = RelayCodec::new();
        let src = BytesMut::from(&b"9|1|zap\n1|2|ok\n"[..]);
        let decoded = collect_all(&mut codec, src);
        assert_eq!(
            decoded,
            vec![
                Err(CodecError::UnknownTag {
                    tag: "9".to_string()
                }),
                Ok(RelayMessage::chat(ClientId::new(2), "ok").unwrap()),
            ]
        );
    }

    #[test]
    fn decode_non_numeric_tag() {
        let mut codec = RelayCodec::new();
        let decoded = collect_all(&mut codec, BytesMut::from(&b"MSG|1|x\n"[..]));
        assert_eq!(
            decoded,
            vec![Err(CodecError::UnknownTag {
                tag: "MSG".to_string()
            })]
        );
    }

    #[test]
    fn decode_missing_fields() {
        let mut codec = RelayCodec::new();
        let decoded = collect_all(&mut codec, BytesMut::from(&b"1\n1|5\n2|5\n3\n"[..]));
        assert_eq!(
            decoded,
            vec![
                Err(CodecError::MissingField {
                    tag: TAG_CHAT,
                    field: "identity"
                }),
                Err(CodecError::MissingField {
                    tag: TAG_CHAT,
                    field: "text"
                }),
                Err(CodecError::MissingField {
                    tag: TAG_USERNAME,
                    field: "username"
                }),
                Err(CodecError::MissingField {
                    tag: TAG_ASSIGN_ID,
                    field: "identity"
                }),
            ]
        );
    }

    #[test]
    fn decode_rejects_invalid_identities() {
        let mut codec = RelayCodec::new();
        let decoded = collect_all(
            &mut codec,
            BytesMut::from(&b"1|abc|x\n1|0|x\n1|99999999999999999999999|x\n"[..]),
        );
        for result in decoded {
            assert!(matches!(result, Err(CodecError::InvalidIdentity { .. })));
        }
    }

    #[test]
    fn decode_rejects_oversized_text() {
        let mut codec = RelayCodec::new();
        let mut raw = BytesMut::from(&b"1|1|"[..]);
        raw.extend_from_slice("y".repeat(MAX_TEXT_LEN + 1).as_bytes());
        raw.extend_from_slice(b"\n");
        let decoded = collect_all(&mut codec, raw);
        assert_eq!(
            decoded,
            vec![Err(CodecError::FieldTooLong {
                field: "text",
                len: MAX_TEXT_LEN + 1,
                max: MAX_TEXT_LEN,
            })]
        );
    }

    #[test]
    fn decode_rejects_smuggled_separator() {
        // A second separator in the trailing field means the sender put a
        // reserved byte into the text.
        let mut codec = RelayCodec::new();
        let decoded = collect_all(&mut codec, BytesMut::from(&b"1|1|a|b\n"[..]));
        assert_eq!(
            decoded,
            vec![Err(CodecError::ReservedByte { field: "text" })]
        );
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let mut codec = RelayCodec::new();
        let decoded = collect_all(&mut codec, BytesMut::from(&b"2|1|\xff\xfe\n"[..]));
        assert_eq!(
            decoded,
            vec![Err(CodecError::InvalidUtf8 { field: "username" })]
        );
    }

    #[test]
    fn decode_rejects_empty_username() {
        let mut codec = RelayCodec::new();
        let decoded = collect_all(&mut codec, BytesMut::from(&b"2|1|\n"[..]));
        assert_eq!(
            decoded,
            vec![Err(CodecError::EmptyField { field: "username" })]
        );
    }

    #[test]
    fn oversized_frame_is_discarded_and_stream_resynchronizes() {
        let mut codec = RelayCodec::new();
        let mut src = BytesMut::new();
        src.extend_from_slice("z".repeat(MAX_FRAME_LEN + 10).as_bytes());

        let result = codec.decode(&mut src);
        assert!(matches!(
            result,
            Ok(Some(Err(CodecError::FrameTooLong { .. })))
        ));

        // Remainder of the runaway frame keeps being skipped...
        src.extend_from_slice(b"still the same frame");
        assert_eq!(codec.decode(&mut src), Ok(None));

        // ...until its terminator, after which the next frame decodes.
        src.extend_from_slice(b"tail\n1|4|back\n");
        assert_eq!(
            codec.decode(&mut src),
            Ok(Some(Ok(RelayMessage::chat(ClientId::new(4), "back").unwrap())))
        );
    }
}
