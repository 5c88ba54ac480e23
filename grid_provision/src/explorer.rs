use crate::auth::AuthHeaders;
use crate::capacity::{CapacityPool, CapacityReservation};
use crate::escrow::{CustomerCapacityEscrowInformation, CustomerEscrowInformation};
use crate::identity::Identity;
use crate::reservation::Reservation;
use crate::signing::SigningSignature;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Result type of explorer calls.
pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// The authority which stores reservations and capacity pools.
///
/// Once a reservation is submitted, the explorer is the source of truth for its state.
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Submit a signed reservation.
    async fn create(&self, reservation: &Reservation) -> ExplorerResult<ReservationCreateResponse>;

    /// Fetch a reservation by id.
    async fn get(&self, id: i64) -> ExplorerResult<Reservation>;

    /// Add a deletion signature of `signer` to a reservation.
    async fn sign_delete(&self, id: i64, signer: i64, signature: &str) -> ExplorerResult<()>;

    /// Submit a signed capacity reservation.
    async fn pool_create(
        &self,
        reservation: &CapacityReservation,
    ) -> ExplorerResult<CapacityPoolCreateResponse>;

    /// Fetch a capacity pool by id.
    async fn pool_get(&self, id: i64) -> ExplorerResult<CapacityPool>;

    /// Fetch all capacity pools of a customer.
    async fn pools_get_by_owner(&self, owner: i64) -> ExplorerResult<Vec<CapacityPool>>;
}

#[async_trait]
impl<E: Explorer + ?Sized> Explorer for Arc<E> {
    async fn create(&self, reservation: &Reservation) -> ExplorerResult<ReservationCreateResponse> {
        (**self).create(reservation).await
    }

    async fn get(&self, id: i64) -> ExplorerResult<Reservation> {
        (**self).get(id).await
    }

    async fn sign_delete(&self, id: i64, signer: i64, signature: &str) -> ExplorerResult<()> {
        (**self).sign_delete(id, signer, signature).await
    }

    async fn pool_create(
        &self,
        reservation: &CapacityReservation,
    ) -> ExplorerResult<CapacityPoolCreateResponse> {
        (**self).pool_create(reservation).await
    }

    async fn pool_get(&self, id: i64) -> ExplorerResult<CapacityPool> {
        (**self).pool_get(id).await
    }

    async fn pools_get_by_owner(&self, owner: i64) -> ExplorerResult<Vec<CapacityPool>> {
        (**self).pools_get_by_owner(owner).await
    }
}

/// Answer of the explorer to a reservation submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationCreateResponse {
    /// Id assigned to the reservation.
    #[serde(rename = "reservation_id")]
    pub id: i64,
    /// Where to pay for the reservation.
    pub escrow_information: CustomerEscrowInformation,
}

/// Answer of the explorer to a capacity reservation submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityPoolCreateResponse {
    /// Id assigned to the capacity reservation.
    pub reservation_id: i64,
    /// Where to pay for the capacity.
    pub escrow_information: CustomerCapacityEscrowInformation,
}

/// An error returned by an explorer call.
#[derive(Debug)]
pub enum ExplorerError {
    /// The request could not be sent, or the response could not be read.
    Reqwest(reqwest::Error),
    /// The explorer answered with an unexpected status.
    Status {
        /// The status code.
        code: u16,
        /// The body of the response, usually the reason of the failure.
        body: String,
    },
    /// Any other failure.
    ExplorerClientError(String),
}

impl ExplorerError {
    /// Check if the explorer reported the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExplorerError::Status { code: 404, .. })
    }
}

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExplorerError::Reqwest(e) => write!(f, "request failed: {}", e),
            ExplorerError::Status { code, body } => {
                write!(f, "explorer returned status {}: {}", code, body)
            }
            ExplorerError::ExplorerClientError(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ExplorerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExplorerError::Reqwest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<String> for ExplorerError {
    fn from(s: String) -> Self {
        ExplorerError::ExplorerClientError(s)
    }
}

impl From<reqwest::Error> for ExplorerError {
    fn from(err: reqwest::Error) -> ExplorerError {
        ExplorerError::Reqwest(err)
    }
}

/// The public grid networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridNetwork {
    /// The production network.
    Mainnet,
    /// The network used to test releases.
    Testnet,
    /// The development network.
    Devnet,
}

impl GridNetwork {
    /// Url of the explorer of the network.
    pub fn url(&self) -> &'static str {
        match self {
            GridNetwork::Mainnet => "https://explorer.grid.tf",
            GridNetwork::Testnet => "https://explorer.testnet.grid.tf",
            GridNetwork::Devnet => "https://explorer.devnet.grid.tf",
        }
    }
}

impl fmt::Display for GridNetwork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            GridNetwork::Mainnet => "mainnet",
            GridNetwork::Testnet => "testnet",
            GridNetwork::Devnet => "devnet",
        })
    }
}

impl FromStr for GridNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(GridNetwork::Mainnet),
            "testnet" => Ok(GridNetwork::Testnet),
            "devnet" => Ok(GridNetwork::Devnet),
            other => Err(format!("unknown grid network {}", other)),
        }
    }
}

/// An [`Explorer`] reached over its REST api. Every request is signed with the identity of the
/// user.
#[derive(Debug, Clone)]
pub struct HttpExplorer {
    base_url: String,
    client: reqwest::Client,
    identity: Arc<Identity>,
}

impl HttpExplorer {
    /// Create a client for the explorer at `base_url`.
    pub fn new(base_url: &str, identity: Arc<Identity>) -> Self {
        HttpExplorer {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            identity,
        }
    }

    /// Create a client for the explorer of a grid network.
    pub fn for_network(network: GridNetwork, identity: Arc<Identity>) -> Self {
        Self::new(network.url(), identity)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/reservations{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let auth = AuthHeaders::new(&self.identity, Utc::now());
        req.header(header::DATE, auth.date)
            .header("threebot-id", auth.threebot_id)
            .header(header::AUTHORIZATION, auth.authorization)
    }

    async fn send(&self, req: RequestBuilder, expected: StatusCode) -> ExplorerResult<Response> {
        let resp = self.authorized(req).send().await?;
        let status = resp.status();
        trace!("explorer answered {} to {}", status, resp.url());
        if status != expected {
            return Err(status_error(status, resp.text().await));
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        expected: StatusCode,
    ) -> ExplorerResult<T> {
        Ok(self.send(req, expected).await?.json::<T>().await?)
    }
}

fn status_error<E: fmt::Display>(status: StatusCode, body: Result<String, E>) -> ExplorerError {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            debug!("could not read body of {} response: {}", status, e);
            String::new()
        }
    };
    ExplorerError::Status {
        code: status.as_u16(),
        body,
    }
}

#[async_trait]
impl Explorer for HttpExplorer {
    async fn create(&self, reservation: &Reservation) -> ExplorerResult<ReservationCreateResponse> {
        let req = self.client.post(self.url("")).json(reservation);
        self.send_json(req, StatusCode::CREATED).await
    }

    async fn get(&self, id: i64) -> ExplorerResult<Reservation> {
        let req = self.client.get(self.url(&format!("/{}", id)));
        self.send_json(req, StatusCode::OK).await
    }

    async fn sign_delete(&self, id: i64, signer: i64, signature: &str) -> ExplorerResult<()> {
        let body = SigningSignature {
            tid: signer,
            signature: signature.to_string(),
            ..Default::default()
        };
        let req = self
            .client
            .post(self.url(&format!("/{}/sign/delete", id)))
            .json(&body);
        self.send(req, StatusCode::CREATED).await?;
        Ok(())
    }

    async fn pool_create(
        &self,
        reservation: &CapacityReservation,
    ) -> ExplorerResult<CapacityPoolCreateResponse> {
        let req = self.client.post(self.url("/pools")).json(reservation);
        self.send_json(req, StatusCode::CREATED).await
    }

    async fn pool_get(&self, id: i64) -> ExplorerResult<CapacityPool> {
        let req = self.client.get(self.url(&format!("/pools/{}", id)));
        self.send_json(req, StatusCode::OK).await
    }

    async fn pools_get_by_owner(&self, owner: i64) -> ExplorerResult<Vec<CapacityPool>> {
        let req = self.client.get(self.url(&format!("/pools/owner/{}", owner)));
        self.send_json(req, StatusCode::OK).await
    }
}
