mod api;
mod blockchain;
mod config;
mod contract;
mod p2p;
mod state;
mod storage;
mod tasks;
mod transaction;
mod wallet;

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use config::NodeConfig;
use p2p::P2pNode;
use state::AppState;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env();
    let (host, port) = (config.http_host.clone(), config.http_port);
    let p2p_listen = config.p2p_listen.clone();
    let light_client = config.light_client;

    let state = Arc::new(AppState::new(config).map_err(io::Error::other)?);
    if light_client {
        info!("NODE - light client: chain will be taken from peers");
    } else {
        state.ensure_genesis();
    }

    let node = P2pNode::bind(Arc::clone(&state), &p2p_listen)
        .await
        .map_err(io::Error::other)?;
    tokio::spawn(node.run());
    p2p::connect_to_peers(&state);
    let _tasks = tasks::spawn_all(&state);

    println!("⛓️ Starting ledger node API at http://{host}:{port} (p2p {p2p_listen})");

    let data = web::Data::from(Arc::clone(&state));
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
