//! HTTP transport to peers serving the `/api/v1/node` routes.
//!
//! Uses the blocking reqwest client: node operations are synchronous and
//! run on actix's blocking pool, never on the async executor.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Connector, PeerAddress, RemoteNode};
use crate::api::models::{
    AddressBody, MineMessageRequest, MiningStatusResponse, NonceResponse, SearchRequest,
    SearchResponse, StopRequest, TipResponse,
};
use crate::error::TransportError;
use crate::transaction::Transaction;

const NODE_PREFIX: &str = "/api/v1/node";

/// Connector for peers addressed by their base URL (`http://host:port`).
#[derive(Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Connector for HttpConnector {
    fn connect(&self, address: &PeerAddress) -> Result<Arc<dyn RemoteNode>, TransportError> {
        Ok(Arc::new(HttpPeer {
            client: self.client.clone(),
            base: address.clone(),
        }))
    }
}

pub struct HttpPeer {
    client: Client,
    base: PeerAddress,
}

impl HttpPeer {
    fn url(&self, path: &str) -> String {
        format!(
            "{}{NODE_PREFIX}{path}",
            self.base.as_str().trim_end_matches('/')
        )
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                TransportError::Unreachable(self.base.to_string())
            } else {
                TransportError::Http(e)
            }
        })?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(TransportError::Status {
                peer: self.base.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, TransportError> {
        let response = self.send(self.client.get(self.url(path)))?;
        self.json(response)
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, TransportError> {
        let response = self.send(self.client.post(self.url(path)).json(body))?;
        self.json(response)
    }

    fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), TransportError> {
        let response = self.send(self.client.post(self.url(path)).json(body))?;
        self.expect_found(&response)
    }

    fn json<R: DeserializeOwned>(&self, response: Response) -> Result<R, TransportError> {
        self.expect_found(&response)?;
        Ok(response.json()?)
    }

    fn expect_found(&self, response: &Response) -> Result<(), TransportError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TransportError::Status {
                peer: self.base.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
            });
        }
        Ok(())
    }

    fn status(&self) -> Result<MiningStatusResponse, TransportError> {
        self.get("/mining/")
    }
}

impl RemoteNode for HttpPeer {
    fn address(&self) -> Result<PeerAddress, TransportError> {
        let body: AddressBody = self.get("/address/")?;
        Ok(body.address)
    }

    fn add_node(&self, peer: &PeerAddress) -> Result<(), TransportError> {
        self.post_unit(
            "/peers/",
            &AddressBody {
                address: peer.clone(),
            },
        )
    }

    fn network(&self) -> Result<Vec<PeerAddress>, TransportError> {
        self.get("/peers/")
    }

    fn find_remote(
        &self,
        key: &str,
        search_id: &str,
        ttl: u32,
    ) -> Result<Option<String>, TransportError> {
        let body: SearchResponse = self.post(
            "/search/",
            &SearchRequest {
                key: key.to_string(),
                search_id: search_id.to_string(),
                ttl,
            },
        )?;
        Ok(body.value)
    }

    fn chain_tip(&self) -> Result<Option<u64>, TransportError> {
        let body: TipResponse = self.get("/chain/tip/")?;
        Ok(body.tip)
    }

    /// A 404 means the peer has no chain.
    fn chain_archive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let response = self.send(self.client.get(self.url("/chain/archive/")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.bytes()?.to_vec()))
    }

    fn propagate_block(&self, block_bytes: &[u8]) -> Result<(), TransportError> {
        let request = self
            .client
            .post(self.url("/blocks/"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(block_bytes.to_vec());
        let response = self.send(request)?;
        self.expect_found(&response)
    }

    fn add_transaction(&self, tx: &Transaction) -> Result<(), TransportError> {
        self.post_unit("/tx/", tx)
    }

    fn transactions(&self) -> Result<Vec<Transaction>, TransportError> {
        self.get("/tx/")
    }

    fn mine(&self, message: &str, difficulty: u32) -> Result<Option<u64>, TransportError> {
        let body: NonceResponse = self.post(
            "/mining/",
            &MineMessageRequest {
                message: message.to_string(),
                difficulty,
            },
        )?;
        Ok(body.nonce)
    }

    fn stop_mining(&self, nonce: u64) -> Result<(), TransportError> {
        self.post_unit("/mining/stop/", &StopRequest { nonce })
    }

    fn is_mining(&self) -> Result<bool, TransportError> {
        Ok(self.status()?.mining)
    }

    fn is_winner(&self) -> Result<bool, TransportError> {
        Ok(self.status()?.winner)
    }

    fn nonce(&self) -> Result<Option<u64>, TransportError> {
        Ok(self.status()?.nonce)
    }

    fn hash(&self) -> Result<Option<String>, TransportError> {
        Ok(self.status()?.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_peer_maps_to_transport_error() {
        let connector = HttpConnector::new(Duration::from_millis(200)).unwrap();
        // Port 9 (discard) on loopback is closed on any sane test host.
        let peer = connector.connect(&PeerAddress::from("http://127.0.0.1:9")).unwrap();
        assert!(peer.chain_tip().is_err());
        assert!(peer.transactions().is_err());
    }

    #[test]
    fn builds_node_urls() {
        let peer = HttpPeer {
            client: Client::new(),
            base: PeerAddress::from("http://10.0.0.2:8080/"),
        };
        assert_eq!(peer.url("/tx/"), "http://10.0.0.2:8080/api/v1/node/tx/");
    }
}
