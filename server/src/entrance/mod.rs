// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Entrance gateway: serves the world list. A request may additionally
//! carry an `ALL+` sub-request, in which case a second `USR` frame with the
//! per-character world assignments follows the list.

mod resp;

pub use resp::{encode_world_assignments, encode_worlds, WorldLayout};

use crate::args::Config;
use crate::crypt_stream::CryptStream;
use crate::db::WorldRegistry;
use crate::session::{supervise, SessionState};
use crate::unix_now;
use anyhow::{bail, Context, Result};
use log::{info, trace, warn};
use protocol::frame::FrameTag;
use protocol::ByteFrame;
use smol::Async;
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Payloads longer than this carry the `ALL+` sub-request.
const SUB_REQUEST_MIN: usize = 5;

pub struct Listener {
    tcp_listener: Async<TcpListener>,
    args: Arc<Config>,
    registry: Arc<dyn WorldRegistry>,
    shutting_down: Mutex<bool>,
}

impl std::fmt::Display for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("entrance")
    }
}

impl Listener {
    pub fn new(
        tcp_listener: Async<TcpListener>,
        args: Arc<Config>,
        registry: Arc<dyn WorldRegistry>,
    ) -> Self {
        Self {
            tcp_listener,
            args,
            registry,
            shutting_down: Mutex::new(false),
        }
    }

    pub async fn listen(&self) -> Result<()> {
        info!(
            "{self}: listening on {}",
            self.tcp_listener.get_ref().local_addr()?
        );
        let timeout = Duration::from_secs(self.args.conn_timeout_secs);
        loop {
            let (stream, _peer) = match self.tcp_listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) if *self.shutting_down.lock().unwrap() => {
                    info!("{self}: shutting down: {err}");
                    return Ok(());
                }
                Err(err) => bail!("accept: {err}"),
            };
            let id = stream.as_raw_fd();
            let session = Session {
                id,
                stream: CryptStream::with_key(stream, rand::random()),
                args: self.args.clone(),
                registry: self.registry.clone(),
                state: SessionState::default(),
            };
            smol::spawn(async move {
                supervise("entrance", id, timeout, session.run()).await;
            })
            .detach();
        }
    }

    pub fn shutdown(&self) {
        *self.shutting_down.lock().unwrap() = true;
    }
}

struct Session {
    id: i32,
    stream: CryptStream<Async<TcpStream>>,
    args: Arc<Config>,
    registry: Arc<dyn WorldRegistry>,
    state: SessionState,
}

impl Session {
    fn advance(&mut self, next: SessionState) {
        trace!("entrance #{}: {} -> {next}", self.id, self.state);
        self.state = next;
    }

    async fn run(mut self) -> Result<()> {
        self.stream.read_init().await?;
        self.advance(SessionState::AwaitingRequest);

        let payload = self.stream.recv().await?;
        self.advance(SessionState::Processing);

        let layout = WorldLayout::for_mode(self.args.client_mode);
        let worlds = self
            .registry
            .worlds()
            .context("world registry unavailable")?;
        let (world_data, entries) = encode_worlds(&worlds, unix_now(), &layout);

        let assignments = if payload.len() > SUB_REQUEST_MIN {
            Some(self.resolve_assignments(&payload)?)
        } else {
            None
        };
        self.advance(SessionState::Responding);

        self.stream.send(layout.tag, entries, &world_data).await?;
        if let Some((count, data)) = assignments {
            self.stream.send(FrameTag::Usr, count, &data).await?;
        }
        self.advance(SessionState::Closed);
        Ok(())
    }

    /// Parses the `ALL+` sub-request and looks up each character's world.
    /// A registry miss for one character never fails the whole lookup.
    fn resolve_assignments(&self, payload: &[u8]) -> Result<(u16, Vec<u8>)> {
        let mut bf = ByteFrame::from_bytes(payload);
        bf.read_u32()?; // sub-request tag
        bf.read_u8()?; // pad
        let count = bf.read_u16()?;

        let mut assignments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let character_id = bf.read_u32()?;
            let world = match self.registry.world_for_character(character_id) {
                Ok(found) => found,
                Err(err) => {
                    warn!(
                        "entrance #{}: assignment lookup for character {character_id} failed: {err:#}",
                        self.id
                    );
                    None
                }
            };
            assignments.push(world);
        }
        Ok((count, encode_world_assignments(&assignments)))
    }
}
