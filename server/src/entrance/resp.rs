// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! World-list serialization. Like the sign response, the per-world record
//! changed shape over the client eras; [`WorldLayout`] captures the gates so
//! `encode_worlds` writes one era without branching on the mode.

use crate::args::ClientMode;
use crate::db::WorldInfo;
use protocol::byteframe::{ByteFrame, Pad};
use protocol::frame::FrameTag;

/// Era-dependent pieces of the world-list response.
pub struct WorldLayout {
    /// `SVR` up to G32, `SV2` afterwards.
    pub tag: FrameTag,
    recommended: bool,
    write_name: fn(&mut ByteFrame, &[u8]),
    client_flags: bool,
    hide_festival: bool,
    hide_return: bool,
}

fn name_fixed(bf: &mut ByteFrame, combined: &[u8]) {
    bf.write_fixed(combined, 65, Pad::Nul);
}

fn name_prefixed(bf: &mut ByteFrame, combined: &[u8]) {
    bf.write_pstr8(combined);
}

fn name_skip_fixed(bf: &mut ByteFrame, combined: &[u8]) {
    bf.write_u8(0); // ignored by the client
    bf.write_fixed(combined, 65, Pad::Nul);
}

impl WorldLayout {
    pub fn for_mode(mode: ClientMode) -> Self {
        Self {
            tag: if mode <= ClientMode::G32 {
                FrameTag::Svr
            } else {
                FrameTag::Sv2
            },
            recommended: mode >= ClientMode::G1,
            write_name: if mode <= ClientMode::F5 {
                name_fixed
            } else if mode <= ClientMode::G5 {
                name_prefixed
            } else {
                name_skip_fixed
            },
            client_flags: mode >= ClientMode::GG,
            hide_festival: mode <= ClientMode::Z1,
            hide_return: mode <= ClientMode::G6,
        }
    }

    /// Whether a world is advertised to this era at all.
    fn visible(&self, world: &WorldInfo) -> bool {
        !(self.hide_festival && world.world_type == 6)
            && !(self.hide_return && world.world_type == 5)
    }
}

/// Serializes the advertised world list. Returns the payload and the entry
/// count for the frame header (hidden worlds are not counted).
pub fn encode_worlds(worlds: &[WorldInfo], now: u32, layout: &WorldLayout) -> (Vec<u8>, u16) {
    let mut bf = ByteFrame::new();
    let mut entries = 0u16;

    for (idx, world) in worlds.iter().enumerate() {
        if !layout.visible(world) {
            continue;
        }
        entries += 1;

        // the launcher reads the address as a host-order word
        bf.set_le();
        bf.write_u32(world.ip.into());
        bf.set_be();

        bf.write_u16(16 + idx as u16);
        bf.write_u16(0x0000);
        bf.write_u16(world.channels.len() as u16);
        bf.write_u8(world.world_type);
        bf.write_u8((((now as u64 / 86400) + idx as u64) % 3) as u8);
        if layout.recommended {
            bf.write_u8(world.recommended);
        }

        let mut combined = world.name.as_bytes().to_vec();
        combined.push(0x00);
        combined.extend_from_slice(world.description.as_bytes());
        (layout.write_name)(&mut bf, &combined);

        if layout.client_flags {
            bf.write_u32(world.allowed_client_flags);
        }

        for (ch_idx, channel) in world.channels.iter().enumerate() {
            bf.write_u16(channel.port);
            bf.write_u16(16 + ch_idx as u16);
            bf.write_u16(channel.max_players);
            bf.write_u16(channel.current_players);
            for _ in 0..6 {
                bf.write_u16(0);
            }
            bf.write_u16(319);
            bf.write_u16(252);
            bf.write_u16(248);
            bf.write_u16(12345);
        }
    }

    bf.write_u32(now);
    bf.write_u32(0x0000003C);
    (bf.into_vec(), entries)
}

/// Maps each character id from an `ALL+` sub-request to the world it is
/// signed into. Unknown characters yield four zero bytes.
pub fn encode_world_assignments(assignments: &[Option<u16>]) -> Vec<u8> {
    let mut bf = ByteFrame::new();
    for assignment in assignments {
        match assignment {
            Some(world_id) => {
                bf.write_u16(*world_id);
                bf.write_u16(0);
            }
            None => bf.write_u32(0),
        }
    }
    bf.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChannelInfo;
    use std::net::Ipv4Addr;

    fn world(world_type: u8) -> WorldInfo {
        WorldInfo {
            name: "Mezeporta".into(),
            description: "main".into(),
            ip: Ipv4Addr::new(10, 20, 30, 40),
            world_type,
            recommended: 1,
            allowed_client_flags: 0,
            channels: vec![ChannelInfo {
                port: 54001,
                max_players: 100,
                current_players: 7,
            }],
        }
    }

    #[test]
    fn address_is_written_reversed() {
        let (data, entries) = encode_worlds(&[world(1)], 0, &WorldLayout::for_mode(ClientMode::ZZ));
        assert_eq!(entries, 1);
        assert_eq!(&data[0..4], &[40, 30, 20, 10]);
    }

    #[test]
    fn tag_follows_the_era() {
        assert_eq!(WorldLayout::for_mode(ClientMode::G32).tag, FrameTag::Svr);
        assert_eq!(WorldLayout::for_mode(ClientMode::G5).tag, FrameTag::Svr);
        assert_eq!(WorldLayout::for_mode(ClientMode::ZZ).tag, FrameTag::Sv2);
    }

    #[test]
    fn festival_and_return_worlds_are_hidden_from_old_eras() {
        let worlds = [world(1), world(5), world(6)];
        let now = 0;

        let (_, all) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::ZZ));
        assert_eq!(all, 3);

        // Z1 still shows return worlds but not festival ones
        let (_, z1) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::Z1));
        assert_eq!(z1, 2);

        let (_, g6) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::G6));
        assert_eq!(g6, 1);
    }

    #[test]
    fn name_block_shape_per_era() {
        let worlds = [world(1)];
        let now = 0;
        // common prefix: ip(4) + index(2) + zero(2) + channels(2) + type(1) + day(1)
        let prefix = 12;

        let (f5, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::F5));
        // fixed 65, no recommended byte
        assert_eq!(f5[prefix + 65], 54001u16.to_be_bytes()[0]);

        let (g5, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::G5));
        // recommended byte, then u8 length prefix
        let combined_len = "Mezeporta".len() + 1 + "main".len();
        assert_eq!(g5[prefix + 1] as usize, combined_len);

        let (zz, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::ZZ));
        // recommended byte, skip byte, fixed 65
        assert_eq!(zz[prefix + 1], 0);
        assert_eq!(&zz[prefix + 2..prefix + 2 + 9], b"Mezeporta");
    }

    #[test]
    fn mid_g_eras_carry_client_flags() {
        let worlds = [world(1)];
        let now = 0;

        // G5 through G10 write the allowed-client-flags word just like the
        // modern eras; the record shape must be identical
        let (zz, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::ZZ));
        for mode in [ClientMode::G7, ClientMode::G10] {
            let (data, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(mode));
            assert_eq!(data.len(), zz.len(), "{mode:?}");
        }

        // one era earlier the field is absent; G32 and GG share the
        // compact name block, so the flags word is the only difference
        let (g32, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::G32));
        let (gg, _) = encode_worlds(&worlds, now, &WorldLayout::for_mode(ClientMode::GG));
        assert_eq!(g32.len() + 4, gg.len());
    }

    #[test]
    fn gg_era_keeps_the_compact_name_block() {
        let worlds = [world(1)];
        let (gg, _) = encode_worlds(&worlds, 0, &WorldLayout::for_mode(ClientMode::GG));

        // recommended byte at 12, then a u8 length prefix, not skip+fixed
        let combined_len = "Mezeporta".len() + 1 + "main".len();
        assert_eq!(gg[13] as usize, combined_len);

        // return worlds stay hidden up to and including GG
        let (_, visible) =
            encode_worlds(&[world(1), world(5)], 0, &WorldLayout::for_mode(ClientMode::GG));
        assert_eq!(visible, 1);
    }

    #[test]
    fn footer_carries_timestamp_and_constant() {
        let now = 1_700_000_000u32;
        let (data, _) = encode_worlds(&[], now, &WorldLayout::for_mode(ClientMode::ZZ));
        assert_eq!(data.len(), 8);
        assert_eq!(&data[0..4], &now.to_be_bytes());
        assert_eq!(&data[4..8], &0x3Cu32.to_be_bytes());
    }

    #[test]
    fn assignment_records_are_four_bytes_each() {
        let data = encode_world_assignments(&[Some(17), None, Some(16)]);
        assert_eq!(data.len(), 12);
        assert_eq!(&data[0..4], &[0, 17, 0, 0]);
        assert_eq!(&data[4..8], &[0, 0, 0, 0]);
        assert_eq!(&data[8..12], &[0, 16, 0, 0]);
    }
}
