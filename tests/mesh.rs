use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use medchain::blockchain::Block;
use medchain::crypto::meets_difficulty;
use medchain::error::{MiningError, NodeError};
use medchain::miner::{DEFAULT_MAX_ATTEMPTS, Miner};
use medchain::node::{BlockDisposition, LocalNetwork, PeerAddress, PeerNode};
use medchain::settlement::SupplyLedger;
use medchain::transaction::Transaction;
use medchain::wallet::generate_keypair_hex;

fn spawn(network: &Arc<LocalNetwork>, name: &str) -> Arc<PeerNode> {
    let node = Arc::new(
        PeerNode::builder(name, network.clone())
            .miner(Miner::new(2, DEFAULT_MAX_ATTEMPTS))
            .build()
            .unwrap(),
    );
    network.register(&node);
    node
}

fn spawn_settled(
    network: &Arc<LocalNetwork>,
    name: &str,
    ledger: &Arc<SupplyLedger>,
) -> Arc<PeerNode> {
    let node = Arc::new(
        PeerNode::builder(name, network.clone())
            .miner(Miner::new(2, DEFAULT_MAX_ATTEMPTS))
            .settlement(ledger.clone())
            .build()
            .unwrap(),
    );
    network.register(&node);
    node
}

fn tx(item: &str, quantity: u64) -> Transaction {
    let (sk, _) = generate_keypair_hex();
    let (_, receiver) = generate_keypair_hex();
    Transaction::signed(&sk, &receiver, item, quantity).unwrap()
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(20);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn addr(name: &str) -> PeerAddress {
    PeerAddress::from(name)
}

#[test]
fn genesis_at_difficulty_three_records_its_transactions() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let first = tx("insulin", 5);
    let second = tx("gauze", 50);

    assert!(a.init_genesis(3, vec![first.clone(), second.clone()]).unwrap());

    let hash = a.with_chain(|bc| bc.last_block().hash_text()).flatten().unwrap();
    assert!(hash.starts_with("000"));
    assert!(meets_difficulty(&hash, 3));
    assert!(a.exists_transaction(&first.signature));
    assert!(a.exists_transaction(&second.signature));
    assert!(!a.exists_transaction(&tx("insulin", 5).signature));
    assert_eq!(a.with_chain(|bc| bc.is_valid_chain()), Some(true));
}

#[test]
fn connecting_is_symmetric_and_transactions_flood() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    a.init_genesis(1, vec![]).unwrap();

    b.add_node(&addr("a")).unwrap();
    assert_eq!(a.peers(), vec![addr("b")]);
    assert_eq!(b.peers(), vec![addr("a")]);
    assert_eq!(b.chain_tip(), Some(0));

    // self and duplicates are ignored
    b.add_node(&addr("b")).unwrap();
    b.add_node(&addr("a")).unwrap();
    assert_eq!(b.peers().len(), 1);

    let t = tx("masks", 100);
    assert!(a.add_transaction(t.clone()).unwrap());
    assert!(b.transactions().contains(&t));
    assert!(!b.add_transaction(t.clone()).unwrap());
    assert_eq!(a.transactions().len(), 1);
}

#[test]
fn mempool_is_merged_when_connecting() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    let pending = tx("saline", 3);
    a.add_transaction(pending.clone()).unwrap();

    b.add_node(&addr("a")).unwrap();
    assert_eq!(b.transactions(), vec![pending]);
}

#[test]
fn membership_spreads_into_a_full_mesh() {
    let network = LocalNetwork::new();
    let nodes: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| spawn(&network, n))
        .collect();

    nodes[1].add_node(&addr("a")).unwrap();
    nodes[2].add_node(&addr("b")).unwrap();
    nodes[3].add_node(&addr("c")).unwrap();

    for node in &nodes {
        assert_eq!(node.peers().len(), 3, "{} peers", node.address());
        assert!(!node.peers().contains(node.address()));
    }
}

#[test]
fn flood_search_honours_ttl_and_search_id() {
    let network = LocalNetwork::new();
    let nodes: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| spawn(&network, n))
        .collect();
    for pair in nodes.windows(2) {
        pair[1].add_node(pair[0].address()).unwrap();
    }
    nodes[3].register_identity("st-mary-pharmacy", "02abc");
    let a = &nodes[0];

    assert_eq!(a.find_remote("st-mary-pharmacy", "q0", 0), None);
    assert_eq!(a.find_remote("st-mary-pharmacy", "q1", 1), None);
    assert_eq!(
        a.find_remote("st-mary-pharmacy", "q2", 2),
        Some("02abc".to_string())
    );
    // every node already answered q2
    assert_eq!(a.find_remote("st-mary-pharmacy", "q2", 5), None);
    assert_eq!(nodes[1].find_remote("st-mary-pharmacy", "q2", 5), None);

    assert_eq!(a.search("st-mary-pharmacy"), Some("02abc".to_string()));
    assert_eq!(a.search("unknown"), None);
}

#[test]
fn mined_block_reaches_every_peer_and_settles() {
    let network = LocalNetwork::new();
    let ledger = Arc::new(SupplyLedger::new());
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    let c = spawn_settled(&network, "c", &ledger);

    a.init_genesis(1, vec![]).unwrap();
    b.add_node(&addr("a")).unwrap();
    c.add_node(&addr("a")).unwrap();

    let t = tx("ventilator", 2);
    a.add_transaction(t.clone()).unwrap();
    assert!(c.transactions().contains(&t));

    let block = a.mine_block().unwrap();
    assert!(wait_until(|| b.chain_tip() == Some(block.id) && c.chain_tip() == Some(block.id)));

    assert!(b.exists_transaction(&t.signature));
    assert!(c.transactions().is_empty());
    assert_eq!(ledger.balance(&t.receiver, "ventilator"), 2);
    assert_eq!(
        b.with_chain(|bc| bc.last_block().current_hash),
        a.with_chain(|bc| bc.last_block().current_hash)
    );
}

#[test]
fn network_block_preempts_local_mining() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    a.init_genesis(1, vec![]).unwrap();
    b.add_node(&addr("a")).unwrap();

    let miner = {
        let b = b.clone();
        thread::spawn(move || b.mine("unreachable target", 8))
    };
    assert!(wait_until(|| b.is_mining()));

    let block = a.mine_block().unwrap();

    assert_eq!(miner.join().unwrap(), Some(block.nonce));
    assert!(!b.is_mining());
    assert!(!b.is_winner());
    assert!(wait_until(|| b.chain_tip() == Some(1)));
}

#[test]
fn network_block_preempts_block_mining() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    a.init_genesis(3, vec![]).unwrap();
    b.add_node(&addr("a")).unwrap();

    let genesis_hash = a.with_chain(|bc| bc.last_block().current_hash).flatten().unwrap();
    let mut incoming = Block::new(1, genesis_hash, 3, vec![tx("plasma", 1)]);
    incoming.mine(&Miner::new(2, DEFAULT_MAX_ATTEMPTS)).unwrap();
    let bytes = serde_json::to_vec(&incoming).unwrap();

    let local = tx("albumin", 2);
    b.add_transaction(local.clone()).unwrap();
    let miner = {
        let b = b.clone();
        thread::spawn(move || b.mine_block())
    };
    assert!(wait_until(|| b.is_mining()));

    // a accepts the block and relays it to b
    assert_eq!(a.propagate_block(&bytes).unwrap(), BlockDisposition::Appended);

    assert!(matches!(
        miner.join().unwrap(),
        Err(NodeError::Mining(MiningError::Stopped(_)))
    ));
    assert!(!b.is_mining());
    assert!(wait_until(|| b.with_chain(|bc| bc.last_block().current_hash)
        == Some(incoming.current_hash)));
    assert_eq!(b.chain_tip(), Some(1));
    assert!(!b.exists_transaction(&local.signature));
    assert!(b.transactions().contains(&local));
}

#[test]
fn received_block_repeating_a_transaction_is_rejected() {
    let network = LocalNetwork::new();
    let ledger = Arc::new(SupplyLedger::new());
    let a = spawn(&network, "a");
    let b = spawn_settled(&network, "b", &ledger);
    a.init_genesis(1, vec![]).unwrap();
    b.add_node(&addr("a")).unwrap();

    let settled = tx("syringes", 5);
    a.add_transaction(settled.clone()).unwrap();
    let block = a.mine_block().unwrap();
    assert!(wait_until(|| b.chain_tip() == Some(block.id)));
    assert_eq!(ledger.balance(&settled.receiver, "syringes"), 5);

    let tip = block.current_hash.unwrap();
    let mut replay = Block::new(2, tip, 1, vec![tx("gauze", 1), settled.clone()]);
    replay.mine(&Miner::new(2, DEFAULT_MAX_ATTEMPTS)).unwrap();
    let replay = serde_json::to_vec(&replay).unwrap();
    assert_eq!(b.propagate_block(&replay).unwrap(), BlockDisposition::Rejected);

    let twice = tx("gloves", 4);
    let mut doubled = Block::new(2, tip, 1, vec![twice.clone(), twice.clone()]);
    doubled.mine(&Miner::new(2, DEFAULT_MAX_ATTEMPTS)).unwrap();
    let doubled = serde_json::to_vec(&doubled).unwrap();
    assert_eq!(b.propagate_block(&doubled).unwrap(), BlockDisposition::Rejected);

    assert_eq!(b.chain_tip(), Some(1));
    assert_eq!(ledger.balance(&settled.receiver, "syringes"), 5);
    assert_eq!(ledger.balance(&twice.receiver, "gloves"), 0);
}

#[test]
fn mining_while_busy_is_refused() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    a.init_genesis(1, vec![]).unwrap();

    let miner = {
        let a = a.clone();
        thread::spawn(move || a.mine("unreachable target", 8))
    };
    assert!(wait_until(|| a.is_mining()));
    assert!(matches!(a.mine_block(), Err(NodeError::Mining(_))));

    a.stop_mining(42);
    assert_eq!(miner.join().unwrap(), Some(42));
    assert_eq!(a.nonce(), Some(42));
}

#[test]
fn joining_node_adopts_the_longer_chain() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");

    a.init_genesis(1, vec![]).unwrap();
    for i in 0..3 {
        a.add_transaction(tx("lot", i + 1)).unwrap();
        a.mine_block().unwrap();
    }
    b.init_genesis(1, vec![]).unwrap();
    b.mine_block().unwrap();

    b.add_node(&addr("a")).unwrap();

    assert_eq!(b.chain_tip(), Some(3));
    assert_eq!(a.chain_tip(), Some(3));
    assert_eq!(
        b.with_chain(|bc| bc.chain.iter().map(|blk| blk.current_hash).collect::<Vec<_>>()),
        a.with_chain(|bc| bc.chain.iter().map(|blk| blk.current_hash).collect::<Vec<_>>())
    );
}

#[test]
fn adopting_a_divergent_chain_rebuilds_settlement() {
    let network = LocalNetwork::new();
    let ledger = Arc::new(SupplyLedger::new());
    let a = spawn_settled(&network, "a", &ledger);
    let b = spawn(&network, "b");

    a.init_genesis(1, vec![]).unwrap();
    let abandoned = tx("vaccines", 7);
    a.add_transaction(abandoned.clone()).unwrap();
    a.mine_block().unwrap();
    assert_eq!(ledger.balance(&abandoned.receiver, "vaccines"), 7);

    b.init_genesis(1, vec![]).unwrap();
    let kept = tx("insulin", 3);
    b.add_transaction(kept.clone()).unwrap();
    b.mine_block().unwrap();
    b.mine_block().unwrap();

    a.add_node(&addr("b")).unwrap();

    assert_eq!(a.chain_tip(), Some(2));
    assert!(!a.exists_transaction(&abandoned.signature));
    assert!(a.transactions().contains(&abandoned));
    assert_eq!(ledger.balance(&abandoned.receiver, "vaccines"), 0);
    assert_eq!(ledger.balance(&abandoned.sender, "vaccines"), 0);
    assert_eq!(ledger.balance(&kept.receiver, "insulin"), 3);
    assert_eq!(ledger.applied_blocks(), 3);
}

#[test]
fn shorter_chain_is_not_adopted() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    a.init_genesis(1, vec![]).unwrap();
    b.init_genesis(1, vec![]).unwrap();
    b.mine_block().unwrap();

    let b_tip_hash = b.with_chain(|bc| bc.last_block().current_hash);
    b.add_node(&addr("a")).unwrap();

    assert_eq!(b.chain_tip(), Some(1));
    assert_eq!(b.with_chain(|bc| bc.last_block().current_hash), b_tip_hash);
    // a adopts b's longer chain when b connects back
    assert_eq!(a.chain_tip(), Some(1));
}

#[test]
fn unreachable_peers_are_skipped() {
    let network = LocalNetwork::new();
    let a = spawn(&network, "a");
    let b = spawn(&network, "b");
    let c = spawn(&network, "c");
    a.init_genesis(1, vec![]).unwrap();
    b.add_node(&addr("a")).unwrap();
    c.add_node(&addr("a")).unwrap();

    network.set_offline(&addr("c"), true);

    let t = tx("oxygen", 1);
    assert!(a.add_transaction(t.clone()).unwrap());
    assert!(b.transactions().contains(&t));
    assert!(!c.transactions().contains(&t));

    a.mine_block().unwrap();
    assert!(wait_until(|| b.chain_tip() == Some(1)));
    assert_eq!(c.chain_tip(), Some(0));

    assert!(matches!(
        a.add_node(&addr("nowhere")),
        Err(NodeError::Transport(_))
    ));
    assert!(!a.knows(&addr("nowhere")));
}
