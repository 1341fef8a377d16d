// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Sign-in gateway. Each connection performs exactly one exchange: the
//! 8-zero-byte init sentinel, one `LGN` request frame, one `SGN` response
//! frame, then the socket closes.

mod resp;

pub use resp::{SignContext, SignLayout};

use crate::args::Config;
use crate::crypt_stream::CryptStream;
use crate::db::AccountService;
use crate::session::{supervise, SessionState};
use crate::unix_now;
use anyhow::{bail, Result};
use log::{info, trace, warn};
use protocol::frame::FrameTag;
use protocol::{ByteFrame, SignCode};
use smol::Async;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const RETURN_EXPIRY_SECS: u32 = 30 * 86400;

/// Console family of the connecting client, inferred from the request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ClientVariant {
    #[default]
    Pc,
    Vita,
    Ps3,
    Ps4,
}

pub struct Listener {
    tcp_listener: Async<TcpListener>,
    args: Arc<Config>,
    accounts: Arc<dyn AccountService>,
    shutting_down: Mutex<bool>,
}

impl std::fmt::Display for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("sign")
    }
}

impl Listener {
    pub fn new(
        tcp_listener: Async<TcpListener>,
        args: Arc<Config>,
        accounts: Arc<dyn AccountService>,
    ) -> Self {
        Self {
            tcp_listener,
            args,
            accounts,
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
            let (stream, peer) = match self.tcp_listener.accept().await {
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
                peer,
                stream: CryptStream::with_key(stream, rand::random()),
                args: self.args.clone(),
                accounts: self.accounts.clone(),
                variant: ClientVariant::default(),
                state: SessionState::default(),
            };
            smol::spawn(async move {
                supervise("sign", id, timeout, session.run()).await;
            })
            .detach();
        }
    }

    pub fn shutdown(&self) {
        *self.shutting_down.lock().unwrap() = true;
    }
}

/// A fully assembled response frame, ready to encrypt and send.
struct Reply {
    entries: u16,
    data: Vec<u8>,
}

impl Reply {
    fn code(code: SignCode) -> Self {
        Self {
            entries: 0,
            data: vec![code.into()],
        }
    }
}

struct Session {
    id: i32,
    peer: SocketAddr,
    stream: CryptStream<Async<TcpStream>>,
    args: Arc<Config>,
    accounts: Arc<dyn AccountService>,
    variant: ClientVariant,
    state: SessionState,
}

impl Session {
    fn advance(&mut self, next: SessionState) {
        trace!("sign #{}: {} -> {next}", self.id, self.state);
        self.state = next;
    }

    async fn run(mut self) -> Result<()> {
        self.stream.read_init().await?;
        self.advance(SessionState::AwaitingRequest);

        let payload = self.stream.recv().await?;
        self.advance(SessionState::Processing);

        let reply = self.process(&payload)?;
        self.advance(SessionState::Responding);

        if let Some(reply) = reply {
            self.stream
                .send(FrameTag::Sgn, reply.entries, &reply.data)
                .await?;
        }
        self.advance(SessionState::Closed);
        Ok(())
    }

    /// Dispatches on the request type. `Ok(None)` means a protocol
    /// violation that must not be answered.
    fn process(&mut self, payload: &[u8]) -> Result<Option<Reply>> {
        let mut bf = ByteFrame::from_bytes(payload);
        let reqtype = bf.read_nt_bytes()?;
        if reqtype.len() < 3 {
            warn!("sign #{}: request type too short", self.id);
            return Ok(None);
        }
        // the last three characters are the client protocol number
        let (kind, _version) = reqtype.split_at(reqtype.len() - 3);

        match kind {
            b"SIGN:" | b"DSGN:" | b"DLTSKEYSIGN:" => self.password_login(&mut bf).map(Some),
            b"VITASGN:" => {
                self.variant = ClientVariant::Vita;
                self.console_login(&mut bf).map(Some)
            }
            b"PS3SGN:" => {
                self.variant = ClientVariant::Ps3;
                self.console_login(&mut bf).map(Some)
            }
            b"PS4SGN:" => {
                self.variant = ClientVariant::Ps4;
                self.console_login(&mut bf).map(Some)
            }
            b"DELETE:" => self.delete_character(&mut bf).map(Some),
            _ => {
                warn!(
                    "sign #{}: unknown request type {:?}",
                    self.id,
                    String::from_utf8_lossy(&reqtype)
                );
                Ok(None)
            }
        }
    }

    fn password_login(&mut self, bf: &mut ByteFrame) -> Result<Reply> {
        let mut user = bf.read_nt_bytes()?;
        let pass = bf.read_nt_bytes()?;

        // trailing '+' asks for a first character to be created
        let new_character = user.last() == Some(&b'+');
        if new_character {
            user.pop();
        }
        let user = String::from_utf8_lossy(&user).into_owned();
        let pass = String::from_utf8_lossy(&pass).into_owned();

        let (account, code) = match self.accounts.validate_credentials(&user, &pass) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!("sign #{}: credential backend failed: {err:#}", self.id);
                return Ok(Reply::code(SignCode::Database));
            }
        };
        if code != SignCode::Success {
            info!("sign #{}: login rejected for {user:?}: {code:?}", self.id);
            return Ok(Reply::code(code));
        }
        if new_character {
            if let Err(err) = self.accounts.create_character(account) {
                warn!("sign #{}: character creation failed: {err:#}", self.id);
            }
        }
        info!("sign #{}: {user:?} signed in as account {account}", self.id);
        self.sign_success(account, None)
    }

    /// VITA/PS3 requests carry a platform blob before the PSN id; PS4 sends
    /// the id directly. Unknown ids get a guest response on account 0.
    fn console_login(&mut self, bf: &mut ByteFrame) -> Result<Reply> {
        if self.variant != ClientVariant::Ps4 {
            if bf.remaining().len() < 128 {
                warn!("sign #{}: undersized console login", self.id);
                return Ok(Reply::code(SignCode::Abort));
            }
            bf.read_nt_bytes()?; // platform version string
            bf.read_bytes(2)?;
            bf.read_bytes(82)?;
        }
        let psn = String::from_utf8_lossy(&bf.read_nt_bytes()?).into_owned();

        let account = match self.accounts.account_for_psn(&psn) {
            Ok(found) => found.unwrap_or(0),
            Err(err) => {
                warn!("sign #{}: psn lookup failed: {err:#}", self.id);
                return Ok(Reply::code(SignCode::Abort));
            }
        };
        self.sign_success(account, Some(psn))
    }

    fn delete_character(&mut self, bf: &mut ByteFrame) -> Result<Reply> {
        let token = String::from_utf8_lossy(&bf.read_nt_bytes()?).into_owned();
        let character_id = bf.read_u32()?;
        let token_id = bf.read_u32()?;

        match self
            .accounts
            .delete_character(character_id, &token, token_id)
        {
            Ok(()) => {
                info!("sign #{}: deleted character {character_id}", self.id);
                Ok(Reply {
                    entries: 0,
                    data: vec![0x01],
                })
            }
            Err(err) => {
                warn!("sign #{}: character deletion refused: {err:#}", self.id);
                Ok(Reply::code(SignCode::Abort))
            }
        }
    }

    /// Builds the full sign response for a validated account.
    fn sign_success(&mut self, account: u32, psn: Option<String>) -> Result<Reply> {
        let mut chars = match self.accounts.characters(account) {
            Ok(chars) => chars,
            Err(err) => {
                warn!("sign #{}: character fetch failed: {err:#}", self.id);
                return Ok(Reply::code(SignCode::Database));
            }
        };
        if chars.is_empty() && account != 0 {
            // every account plays through at least one character slot
            if self.accounts.create_character(account).is_ok() {
                chars = self.accounts.characters(account).unwrap_or_default();
            }
        }

        let token = match (account, &psn) {
            (0, Some(psn)) => self.accounts.register_psn_token(psn),
            _ => self.accounts.register_session_token(account),
        };
        let (token_id, token) = match token {
            Ok(issued) => issued,
            Err(err) => {
                warn!("sign #{}: token registration failed: {err:#}", self.id);
                return Ok(Reply::code(SignCode::Abort));
            }
        };

        let patch = match (
            &self.args.patch_server_manifest,
            &self.args.patch_server_file,
        ) {
            (Some(manifest), Some(file)) => Some((manifest.as_str(), file.as_str())),
            _ if self.variant == ClientVariant::Ps3 => {
                // a PS3 client cannot boot without a patch server to dial
                warn!("sign #{}: ps3 client but no patch server configured", self.id);
                return Ok(Reply::code(SignCode::Abort));
            }
            _ => None,
        };

        let entrance_host = if self.peer.ip().is_loopback() {
            format!("127.0.0.1:{}", self.args.entrance_port)
        } else {
            format!("{}:{}", self.args.host, self.args.entrance_port)
        };

        let friends = self.accounts.friends(&chars).unwrap_or_default();
        let guildmates = self.accounts.guildmates(&chars).unwrap_or_default();
        let now = unix_now();

        let ctx = SignContext {
            now,
            token_id,
            token: &token,
            patch,
            entrance_host,
            chars: &chars,
            friends: &friends,
            guildmates: &guildmates,
            notices: &self.args.login_notices,
            last_character: self.accounts.last_character(account).unwrap_or(0),
            rights: self.accounts.user_rights(account).unwrap_or(0),
            psn_pad: match self.variant {
                ClientVariant::Vita | ClientVariant::Ps3 => Some(psn.as_deref().unwrap_or("")),
                _ => None,
            },
            return_expiry: now + RETURN_EXPIRY_SECS,
        };
        let layout = SignLayout::for_mode(self.args.client_mode);

        Ok(Reply {
            entries: ctx.chars.len() as u16,
            data: resp::encode(&ctx, &layout),
        })
    }
}
