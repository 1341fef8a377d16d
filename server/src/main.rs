// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use anyhow::Result;
use clap::Parser;
use log::info;
use server::args::{Config, Service};
use server::db::{ChannelInfo, MemAccountService, MemWorldRegistry, WorldInfo};
use server::{entrance, sign};
use smol::Async;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;

/// Standalone gateway with in-memory backends, mainly for development and
/// client-compatibility testing.
fn main() -> Result<()> {
    server::setup_log(false);
    let args = Arc::new(Config::parse());

    let services = if args.services.is_empty() {
        vec![Service::Sign, Service::Entrance]
    } else {
        args.services.clone()
    };

    smol::block_on(async {
        let mut tasks = Vec::new();
        for service in services {
            match service {
                Service::Sign => {
                    let accounts = Arc::new(MemAccountService::new());
                    accounts.add_user("test", "test");
                    info!("sign: dev account \"test\"/\"test\" available");

                    let socket =
                        Async::<TcpListener>::bind((Ipv4Addr::UNSPECIFIED, args.sign_port))?;
                    let listener =
                        Arc::new(sign::Listener::new(socket, args.clone(), accounts));
                    tasks.push(smol::spawn(
                        async move { listener.listen().await },
                    ));
                }
                Service::Entrance => {
                    let registry = Arc::new(MemWorldRegistry::new(vec![WorldInfo {
                        name: "Mezeporta".into(),
                        description: "development world".into(),
                        ip: Ipv4Addr::LOCALHOST,
                        world_type: 1,
                        recommended: 1,
                        allowed_client_flags: 0,
                        channels: vec![ChannelInfo {
                            port: 54001,
                            max_players: 100,
                            current_players: 0,
                        }],
                    }]));

                    let socket =
                        Async::<TcpListener>::bind((Ipv4Addr::UNSPECIFIED, args.entrance_port))?;
                    let listener =
                        Arc::new(entrance::Listener::new(socket, args.clone(), registry));
                    tasks.push(smol::spawn(
                        async move { listener.listen().await },
                    ));
                }
            }
        }
        for task in tasks {
            task.await?;
        }
        Ok(())
    })
}
