// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[clap(rename_all = "kebab_case")]
pub enum Service {
    Sign,
    Entrance,
}

/// Client era the gateways speak to. Several response layouts are gated on
/// it, so the ordering of the variants matters; see the layout tables in
/// `sign::resp` and `entrance::resp`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[clap(rename_all = "kebab_case")]
pub enum ClientMode {
    F1,
    F2,
    F3,
    F4,
    F5,
    G1,
    G2,
    G32,
    GG,
    G5,
    G6,
    G7,
    G8,
    G9,
    G10,
    Z1,
    Z2,
    #[default]
    ZZ,
}

#[derive(Parser, Debug)]
#[clap(name = "frontiergw", version)]
pub struct Config {
    #[clap(short = 's', long = "service", value_delimiter = ',', num_args = 1..)]
    pub services: Vec<Service>,

    /// Host advertised to clients in sign responses.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 53312)]
    pub sign_port: u16,

    #[arg(long, default_value_t = 53310)]
    pub entrance_port: u16,

    #[arg(long, value_enum, default_value_t = ClientMode::ZZ)]
    pub client_mode: ClientMode,

    /// Sessions that don't complete their exchange within this window are
    /// dropped.
    #[arg(long, default_value_t = 30)]
    pub conn_timeout_secs: u64,

    #[arg(long)]
    pub patch_server_manifest: Option<String>,

    #[arg(long)]
    pub patch_server_file: Option<String>,

    /// May be given multiple times; pages are joined on the wire.
    #[arg(long = "login-notice")]
    pub login_notices: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            host: "127.0.0.1".into(),
            sign_port: 53312,
            entrance_port: 53310,
            client_mode: ClientMode::default(),
            conn_timeout_secs: 30,
            patch_server_manifest: None,
            patch_server_file: None,
            login_notices: Vec::new(),
        }
    }
}
