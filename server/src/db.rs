// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Domain collaborators consumed by the gateway sessions. The real backends
//! live elsewhere (SQL, other services); the gateways only depend on these
//! traits. Calls may block the calling session task, never the accept loop.

use anyhow::{bail, Result};
use protocol::SignCode;
use rand::distributions::{Alphanumeric, DistString};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct Character {
    pub id: u32,
    pub hr: u16,
    /// Weapon class, 0-13.
    pub weapon_type: u16,
    /// Unix timestamp of the last login.
    pub last_login: u32,
    pub is_female: bool,
    /// Freshly created and not yet named; the client renders `?????`.
    pub is_new_character: bool,
    pub name: String,
    pub motto: String,
    pub gr: u16,
}

/// A friend- or guildmate-list entry in the sign response.
#[derive(Debug, Clone)]
pub struct Member {
    pub character_id: u32,
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub port: u16,
    pub max_players: u16,
    pub current_players: u16,
}

#[derive(Debug, Clone)]
pub struct WorldInfo {
    pub name: String,
    pub description: String,
    pub ip: Ipv4Addr,
    /// 5 = "return" worlds, 6 = festival worlds; some eras hide these.
    pub world_type: u8,
    pub recommended: u8,
    pub allowed_client_flags: u32,
    pub channels: Vec<ChannelInfo>,
}

pub trait AccountService: Send + Sync {
    /// Checks a username/password pair. `Ok((id, code))` carries the domain
    /// verdict; `Err` means the backend itself failed.
    fn validate_credentials(&self, user: &str, pass: &str) -> Result<(u32, SignCode)>;

    /// Account linked to a console network id, if any.
    fn account_for_psn(&self, psn: &str) -> Result<Option<u32>>;

    fn characters(&self, account: u32) -> Result<Vec<Character>>;

    fn create_character(&self, account: u32) -> Result<()>;

    /// Issues a session token for the account and returns `(token_id,
    /// token)`. The token is picked up later by the world servers.
    fn register_session_token(&self, account: u32) -> Result<(u32, String)>;

    /// Token issuance for console guests that have no account yet.
    fn register_psn_token(&self, psn: &str) -> Result<(u32, String)>;

    fn friends(&self, chars: &[Character]) -> Result<Vec<Member>>;

    fn guildmates(&self, chars: &[Character]) -> Result<Vec<Member>>;

    fn last_character(&self, account: u32) -> Result<u32>;

    fn user_rights(&self, account: u32) -> Result<u32>;

    /// Deletes a character after verifying the presented token.
    fn delete_character(&self, character_id: u32, token: &str, token_id: u32) -> Result<()>;
}

pub trait WorldRegistry: Send + Sync {
    fn worlds(&self) -> Result<Vec<WorldInfo>>;

    /// World id a character is currently signed into, if any.
    fn world_for_character(&self, character_id: u32) -> Result<Option<u16>>;
}

pub fn generate_token(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), len)
}

#[derive(Debug, Default)]
struct MemUser {
    id: u32,
    password: String,
    psn: Option<String>,
    rights: u32,
    characters: Vec<Character>,
}

#[derive(Debug, Default)]
struct MemState {
    users: HashMap<String, MemUser>,
    /// token_id -> (token, owning account)
    tokens: HashMap<u32, (String, u32)>,
    next_user_id: u32,
    next_character_id: u32,
    next_token_id: u32,
}

/// In-memory [`AccountService`], used by the standalone binary and the
/// integration tests.
#[derive(Debug)]
pub struct MemAccountService {
    state: Mutex<MemState>,
}

impl Default for MemAccountService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemAccountService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState {
                next_user_id: 1,
                next_character_id: 1,
                next_token_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn add_user(&self, name: &str, password: &str) -> u32 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_user_id;
        state.next_user_id += 1;
        state.users.insert(
            name.to_owned(),
            MemUser {
                id,
                password: password.to_owned(),
                rights: 0x0E,
                ..Default::default()
            },
        );
        id
    }

    pub fn link_psn(&self, name: &str, psn: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(name) {
            user.psn = Some(psn.to_owned());
        }
    }

    pub fn add_character(&self, account: u32, mut character: Character) -> u32 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_character_id;
        state.next_character_id += 1;
        character.id = id;
        if let Some(user) = state.users.values_mut().find(|u| u.id == account) {
            user.characters.push(character);
        }
        id
    }
}

impl AccountService for MemAccountService {
    fn validate_credentials(&self, user: &str, pass: &str) -> Result<(u32, SignCode)> {
        let state = self.state.lock().unwrap();
        match state.users.get(user) {
            Some(u) if u.password == pass => Ok((u.id, SignCode::Success)),
            Some(_) => Ok((0, SignCode::Pass)),
            None => Ok((0, SignCode::Auth)),
        }
    }

    fn account_for_psn(&self, psn: &str) -> Result<Option<u32>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.psn.as_deref() == Some(psn))
            .map(|u| u.id))
    }

    fn characters(&self, account: u32) -> Result<Vec<Character>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.id == account)
            .map(|u| u.characters.clone())
            .unwrap_or_default())
    }

    fn create_character(&self, account: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_character_id;
        state.next_character_id += 1;
        let Some(user) = state.users.values_mut().find(|u| u.id == account) else {
            bail!("no such account: {account}");
        };
        user.characters.push(Character {
            id,
            is_new_character: true,
            ..Default::default()
        });
        Ok(())
    }

    fn register_session_token(&self, account: u32) -> Result<(u32, String)> {
        let mut state = self.state.lock().unwrap();
        let token_id = state.next_token_id;
        state.next_token_id += 1;
        let token = generate_token(16);
        state.tokens.insert(token_id, (token.clone(), account));
        Ok((token_id, token))
    }

    fn register_psn_token(&self, _psn: &str) -> Result<(u32, String)> {
        self.register_session_token(0)
    }

    fn friends(&self, _chars: &[Character]) -> Result<Vec<Member>> {
        Ok(Vec::new())
    }

    fn guildmates(&self, _chars: &[Character]) -> Result<Vec<Member>> {
        Ok(Vec::new())
    }

    fn last_character(&self, account: u32) -> Result<u32> {
        Ok(self
            .characters(account)?
            .first()
            .map(|c| c.id)
            .unwrap_or(0))
    }

    fn user_rights(&self, account: u32) -> Result<u32> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .find(|u| u.id == account)
            .map(|u| u.rights)
            .unwrap_or(0))
    }

    fn delete_character(&self, character_id: u32, token: &str, token_id: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.tokens.get(&token_id) {
            Some((t, _)) if t == token => {}
            _ => bail!("invalid session token"),
        }
        for user in state.users.values_mut() {
            user.characters.retain(|c| c.id != character_id);
        }
        Ok(())
    }
}

/// In-memory [`WorldRegistry`].
#[derive(Debug, Default)]
pub struct MemWorldRegistry {
    worlds: Vec<WorldInfo>,
    assignments: Mutex<HashMap<u32, u16>>,
}

impl MemWorldRegistry {
    pub fn new(worlds: Vec<WorldInfo>) -> Self {
        Self {
            worlds,
            assignments: Mutex::new(HashMap::new()),
        }
    }

    pub fn assign(&self, character_id: u32, world_id: u16) {
        self.assignments
            .lock()
            .unwrap()
            .insert(character_id, world_id);
    }
}

impl WorldRegistry for MemWorldRegistry {
    fn worlds(&self) -> Result<Vec<WorldInfo>> {
        Ok(self.worlds.clone())
    }

    fn world_for_character(&self, character_id: u32) -> Result<Option<u16>> {
        Ok(self.assignments.lock().unwrap().get(&character_id).copied())
    }
}
