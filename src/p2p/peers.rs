use std::sync::Mutex;

use log::info;

/// Known peer addresses. `self_address` is never added.
#[derive(Debug)]
pub struct PeerList {
    self_address: String,
    peers: Mutex<Vec<String>>,
}

impl PeerList {
    pub fn new(self_address: &str, initial: Vec<String>) -> Self {
        let list = Self {
            self_address: self_address.to_string(),
            peers: Mutex::new(Vec::new()),
        };
        list.merge(&initial);
        list
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.peers.lock().expect("mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `peer` unless it is blank, ourselves, or already known.
    pub fn add(&self, peer: &str) -> bool {
        let peer = peer.trim();
        if peer.is_empty() || peer == self.self_address {
            return false;
        }
        let mut peers = self.peers.lock().expect("mutex poisoned");
        if peers.iter().any(|p| p == peer) {
            return false;
        }
        peers.push(peer.to_string());
        true
    }

    /// Add every new address from `received`. Returns how many were new.
    pub fn merge(&self, received: &[String]) -> usize {
        let added = received.iter().filter(|p| self.add(p)).count();
        if added > 0 {
            info!("P2P - peer list updated: {:?}", self.snapshot());
        }
        added
    }

    pub fn remove(&self, peer: &str) -> bool {
        let mut peers = self.peers.lock().expect("mutex poisoned");
        let before = peers.len();
        peers.retain(|p| p != peer);
        peers.len() != before
    }
}
