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

//! Relay client implementation
//!
//! The client side of the relay protocol: dials the server, receives its
//! identity assignment, announces the local username, and keeps a partial
//! mirror of the server's roster driven by inbound broadcasts. Rendering
//! and input are opaque collaborators behind the [`ChatHandler`] seam and
//! the [`RelayClient::send_chat`] entry point.

mod client;
mod config;
mod error;
mod handler;
mod mirror;

pub use client::RelayClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use handler::ChatHandler;
pub use mirror::{ClientMirror, MirrorEvent};

// Wire-level types, re-exported so embedders of the client need only this
// crate.
pub use parley_codec::{ClientId, CodecError, RelayCodec, RelayMessage};
