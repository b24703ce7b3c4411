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

//! Relay Wire Codec
//!
//! This crate implements the wire protocol shared by the relay server and
//! client: a delimited textual frame per message, carried over any ordered,
//! reliable byte stream.
//!
//! # Wire format
//!
//! ```text
//! <tag> '|' <field1> ['|' <field2>] '\n'
//! ```
//!
//! | tag | message  | fields                     | direction       |
//! |-----|----------|----------------------------|-----------------|
//! | 1   | Chat     | identity, text (≤120 B)    | bidirectional   |
//! | 2   | Username | identity, username (≤80 B) | bidirectional   |
//! | 3   | AssignId | identity                   | server → client |
//!
//! `'|'` and `'\n'` are reserved bytes. Encoding rejects (never truncates)
//! any string field that contains them or exceeds its length bound, and
//! decoding applies the same limits, so `decode(encode(m)) == m` holds for
//! every representable message.

mod codec;
mod message;
mod result;

pub use self::codec::RelayCodec;
pub use self::message::{
    ClientId, RelayMessage, FIELD_SEPARATOR, FRAME_END, MAX_FRAME_LEN, MAX_TEXT_LEN,
    MAX_USERNAME_LEN, TAG_ASSIGN_ID, TAG_CHAT, TAG_USERNAME,
};
pub use self::result::{CodecError, CodecResult};
