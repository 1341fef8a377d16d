// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Sign response serialization. The record layout drifted across client
//! eras; everything era-dependent is funneled through [`SignLayout`] so the
//! encoder itself stays branch-free.

use crate::args::ClientMode;
use crate::db::{Character, Member};
use protocol::byteframe::{ByteFrame, Pad};

/// Era-dependent pieces of the sign response.
pub struct SignLayout {
    /// Appended after each character record from G7 on.
    character_tail: Option<fn(&mut ByteFrame, &Character)>,
}

fn gr_tail(bf: &mut ByteFrame, chr: &Character) {
    bf.write_u16(chr.gr);
    bf.write_u8(0);
    bf.write_u8(0);
}

impl SignLayout {
    pub fn for_mode(mode: ClientMode) -> Self {
        Self {
            character_tail: (mode >= ClientMode::G7).then_some(gr_tail as _),
        }
    }
}

/// Everything the encoder needs, already fetched. Collaborator calls happen
/// in the session, not here.
pub struct SignContext<'a> {
    pub now: u32,
    pub token_id: u32,
    pub token: &'a str,
    /// Patch server manifest and file URLs, when advertised.
    pub patch: Option<(&'a str, &'a str)>,
    /// `host:port` of the entrance gateway as the client should dial it.
    pub entrance_host: String,
    pub chars: &'a [Character],
    pub friends: &'a [Member],
    pub guildmates: &'a [Member],
    pub notices: &'a [String],
    pub last_character: u32,
    pub rights: u32,
    /// Vita and PS3 clients expect a padded PSN id after the filter block.
    pub psn_pad: Option<&'a str>,
    pub return_expiry: u32,
}

const SUCCESS: u8 = 1;

pub fn encode(ctx: &SignContext, layout: &SignLayout) -> Vec<u8> {
    let mut bf = ByteFrame::new();

    bf.write_u8(SUCCESS);
    bf.write_u8(if ctx.patch.is_some() { 2 } else { 0 });
    bf.write_u8(1); // entrance server count
    bf.write_u8(ctx.chars.len() as u8);
    bf.write_u32(ctx.token_id);
    bf.write_bytes(ctx.token.as_bytes());
    bf.write_u32(ctx.now);
    if let Some((manifest, file)) = ctx.patch {
        bf.write_pstr8(manifest.as_bytes());
        bf.write_pstr8(file.as_bytes());
    }
    bf.write_pstr8(ctx.entrance_host.as_bytes());

    for chr in ctx.chars {
        bf.write_u32(chr.id);
        bf.write_u16(chr.hr);
        bf.write_u16(chr.weapon_type);
        bf.write_u32(chr.last_login);
        bf.write_bool(chr.is_female);
        bf.write_bool(chr.is_new_character);
        bf.write_u8(0); // legacy single-byte GR
        bf.write_bool(true); // GR is carried as u16 below
        bf.write_fixed(chr.name.as_bytes(), 16, Pad::Nul);
        bf.write_fixed(chr.motto.as_bytes(), 32, Pad::Nul);
        if let Some(tail) = layout.character_tail {
            tail(&mut bf, chr);
        }
    }

    for list in [ctx.friends, ctx.guildmates] {
        bf.write_u8(list.len().min(255) as u8);
        for member in list.iter().take(255) {
            bf.write_u32(member.character_id);
            bf.write_u32(member.id);
            bf.write_pstr8(member.name.as_bytes());
        }
    }

    if ctx.notices.is_empty() {
        bf.write_bool(false);
    } else {
        bf.write_bool(true);
        bf.write_pstr32(ctx.notices.join("<PAGE>").as_bytes());
    }

    bf.write_u32(ctx.last_character);
    bf.write_u32(ctx.rights);
    bf.write_pstr16(b""); // filters
    if let Some(psn) = ctx.psn_pad {
        bf.write_fixed(psn.as_bytes(), 20, Pad::Nul);
    }
    bf.write_u16(0xCA10);
    bf.write_u16(0x4E20);
    bf.write_pstr16(b""); // link key
    bf.write_u8(0x00);
    bf.write_u16(0xCA11);
    bf.write_u16(0x0001);
    bf.write_u16(0x4E20);
    bf.write_pstr16(b""); // link address
    bf.write_u32(ctx.return_expiry);
    bf.write_u32(0x00000000);
    bf.write_u32(0x0A5197DF);
    // no seasonal event scheduled
    bf.write_u32(0);
    bf.write_u32(0);

    bf.into_vec()
}
