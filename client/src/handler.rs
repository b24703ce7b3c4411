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

//! Display-side handler trait
//!
//! The relay client treats the rendering surface as an opaque collaborator:
//! anything that can accept attributed `(sender, text)` pairs can be a
//! display. All methods are async and default to doing nothing, so a
//! handler implements only what it renders.

use async_trait::async_trait;
use parley_codec::ClientId;

/// Receiver for everything the client session wants displayed or tracked.
///
/// # Example
///
/// ```no_run
/// use parley_client::ChatHandler;
/// use async_trait::async_trait;
///
/// struct Printer;
///
/// #[async_trait]
/// impl ChatHandler for Printer {
///     async fn on_chat(&self, label: &str, text: &str) {
///         println!("<{label}> {text}");
///     }
/// }
/// ```
#[async_trait]
pub trait ChatHandler: Send + Sync + 'static {
    /// Called when the server assigns this client its identity
    async fn on_assigned(&self, _id: ClientId) {}

    /// Called when a peer announces or changes its username
    ///
    /// `renamed_from` carries the previous name when this is a rename.
    async fn on_peer_announced(
        &self,
        _id: ClientId,
        _username: &str,
        _renamed_from: Option<&str>,
    ) {
    }

    /// Called for every chat line to display
    ///
    /// `label` is the author's username, or a placeholder when the author
    /// was never announced.
    async fn on_chat(&self, _label: &str, _text: &str) {}

    /// Called once when the server connection ends, for any reason
    async fn on_disconnect(&self) {}
}
