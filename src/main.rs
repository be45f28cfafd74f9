use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::thread;

use medchain::api::{self, AppState};
use medchain::config::NodeConfig;
use medchain::miner::Miner;
use medchain::node::{HttpConnector, PeerAddress, PeerNode};
use medchain::settlement::SupplyLedger;
use medchain::storage::ChainStore;

// The node and its blocking HTTP client are built before the actix
// runtime starts; node calls only ever run on the blocking pool.
fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let cfg = NodeConfig::from_env().map_err(std::io::Error::other)?;
    let address = cfg.address();

    let store = ChainStore::open(&cfg.data_dir).map_err(std::io::Error::other)?;
    let connector = HttpConnector::new(cfg.peer_timeout).map_err(std::io::Error::other)?;
    let ledger = Arc::new(SupplyLedger::new());
    let node = PeerNode::builder(address.as_str(), Arc::new(connector))
        .store(store)
        .settlement(ledger.clone())
        .miner(Miner::new(cfg.miner_threads, cfg.max_nonce))
        .search(cfg.search_ttl, cfg.search_cache_size)
        .build()
        .map_err(std::io::Error::other)?;
    let node = Arc::new(node);

    if cfg.genesis && cfg.peers.is_empty() {
        match node.init_genesis(cfg.difficulty, Vec::new()) {
            Ok(true) => info!("⛓️ genesis mined at difficulty {}", cfg.difficulty),
            Ok(false) => {}
            Err(e) => error!("genesis failed: {e}"),
        }
    }
    node.listener()
        .on_start(&format!("{address} ({} blocks)", node.stats().chain_length));

    println!("⛓️ Starting supply-chain node at http://{}:{}", cfg.host, cfg.port);

    let state = web::Data::new(AppState {
        node: node.clone(),
        ledger,
    });
    actix_web::rt::System::new().block_on(async move {
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .app_data(web::PayloadConfig::new(64 * 1024 * 1024))
                .configure(api::init_routes)
        })
        .bind((cfg.host.as_str(), cfg.port))?;

        // Peers call back while we connect, so the socket must be bound first.
        if !cfg.peers.is_empty() {
            bootstrap(node, cfg.peers.clone(), cfg.genesis.then_some(cfg.difficulty));
        }
        server.run().await
    })
}

fn bootstrap(node: Arc<PeerNode>, peers: Vec<String>, genesis_difficulty: Option<u32>) {
    thread::spawn(move || {
        for peer in peers {
            if let Err(e) = node.add_node(&PeerAddress::new(peer.as_str())) {
                warn!("bootstrap peer {peer} skipped: {e}");
            }
        }
        // Nobody had a chain to share.
        if let Some(difficulty) = genesis_difficulty {
            if node.chain_tip().is_none() {
                if let Err(e) = node.init_genesis(difficulty, Vec::new()) {
                    error!("genesis failed: {e}");
                }
            }
        }
    });
}
