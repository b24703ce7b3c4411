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

//! Relay Chat Client
//!
//! Line-oriented terminal client: prompts for a username, then sends each
//! input line as a chat message. `/exit` leaves cleanly after flushing
//! anything still queued.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example relay_client -- 127.0.0.1:7777
//! ```

use parley_client::{ChatHandler, ClientConfig, ClientId, RelayClient};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Println-backed display surface.
struct TerminalDisplay;

#[async_trait::async_trait]
impl ChatHandler for TerminalDisplay {
    async fn on_assigned(&self, id: ClientId) {
        println!("* connected as {id}");
    }

    async fn on_peer_announced(&self, _id: ClientId, username: &str, renamed_from: Option<&str>) {
        match renamed_from {
            Some(previous) => println!("* {previous} is now {username}"),
            None => println!("* {username} is here"),
        }
    }

    async fn on_chat(&self, label: &str, text: &str) {
        println!("<{label}> {text}");
    }

    async fn on_disconnect(&self) {
        println!("* disconnected from server");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string());
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or("address must be host:port")?;
    let port: u16 = port.parse()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("enter the name:");
    let username = loop {
        match lines.next_line().await? {
            Some(line) if !line.trim().is_empty() => break line.trim().to_string(),
            Some(_) => println!("enter the name:"),
            None => return Ok(()),
        }
    };

    let config = ClientConfig::new(host, port).with_username(&username);
    let client = RelayClient::connect(config, Arc::new(TerminalDisplay)).await?;
    println!("* joined {addr}; type /exit to leave");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" {
            break;
        }

        // Echo locally right away; the server never sends our own lines
        // back to us.
        println!("<{username}> {line}");
        if let Err(error) = client.send_chat(line).await {
            eprintln!("! {error}");
        }
    }

    client.close().await?;
    Ok(())
}
