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

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Represents possible errors that can occur while encoding or decoding
/// relay frames.
///
/// Every variant is a per-message failure: the offending frame is consumed
/// and the stream remains usable. Callers are expected to drop the message
/// (optionally logging it) rather than tear down the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An I/O error occurred while reading from or writing to the underlying stream.
    IOError {
        /// The kind of I/O error that occurred
        kind: std::io::ErrorKind,
        /// Description of the operation that failed
        operation: String,
    },

    /// The frame's type tag is not one of the known message tags.
    UnknownTag {
        /// The tag field as received, before numeric interpretation
        tag: String,
    },

    /// The frame ended before all fields required by its tag were present.
    MissingField {
        /// The tag of the frame being decoded
        tag: u8,
        /// Name of the first missing field
        field: &'static str,
    },

    /// A string field was present but empty where a value is required.
    EmptyField {
        /// Name of the empty field
        field: &'static str,
    },

    /// A string field exceeded its length bound.
    FieldTooLong {
        /// Name of the oversized field
        field: &'static str,
        /// Actual length in bytes
        len: usize,
        /// Maximum permitted length in bytes
        max: usize,
    },

    /// A string field contained a reserved byte (the field separator or the
    /// frame terminator).
    ReservedByte {
        /// Name of the offending field
        field: &'static str,
    },

    /// An identity field was not a positive decimal integer.
    InvalidIdentity {
        /// The identity field as received
        field: String,
    },

    /// A string field was not valid UTF-8.
    InvalidUtf8 {
        /// Name of the offending field
        field: &'static str,
    },

    /// The accumulated frame exceeded the maximum frame length without a
    /// terminator appearing.
    FrameTooLong {
        /// Number of bytes accumulated when the limit was hit
        len: usize,
    },
}

impl std::error::Error for CodecError {}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::IOError { kind, operation } => {
                write!(f, "I/O error during {}: {:?}", operation, kind)
            }
            CodecError::UnknownTag { tag } => {
                write!(f, "unknown message tag: {:?}", tag)
            }
            CodecError::MissingField { tag, field } => {
                write!(f, "frame with tag {} is missing field {:?}", tag, field)
            }
            CodecError::EmptyField { field } => {
                write!(f, "field {:?} is empty", field)
            }
            CodecError::FieldTooLong { field, len, max } => {
                write!(f, "field {:?} is {} bytes (max {})", field, len, max)
            }
            CodecError::ReservedByte { field } => {
                write!(f, "field {:?} contains a reserved byte", field)
            }
            CodecError::InvalidIdentity { field } => {
                write!(f, "identity field {:?} is not a positive integer", field)
            }
            CodecError::InvalidUtf8 { field } => {
                write!(f, "field {:?} is not valid UTF-8", field)
            }
            CodecError::FrameTooLong { len } => {
                write!(f, "unterminated frame of {} bytes exceeds the frame limit", len)
            }
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::IOError {
            kind: err.kind(),
            operation: err.to_string(),
        }
    }
}
