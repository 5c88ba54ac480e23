use super::WorkloadType;
use crate::lifecycle::NextAction;
use crate::schema::Date;
use crate::signing::{Challenge, SigningRequest, SigningSignature};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// The envelope every workload carries: identity, placement, lifecycle and signatures.
///
/// The `id` is assigned by the explorer when the workload is accepted, it is zero for any
/// workload which has not been submitted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationInfo {
    /// Id of the workload within its reservation.
    pub workload_id: i64,
    /// Id of the node which runs the workload.
    pub node_id: String,
    /// Capacity pool paying for the workload.
    pub pool_id: i64,
    /// Free form reference set by the customer.
    pub reference: String,
    /// Human readable description.
    pub description: String,
    /// Who needs to sign before the workload is provisioned.
    pub signing_request_provision: SigningRequest,
    /// Who needs to sign before the workload is deleted.
    pub signing_request_delete: SigningRequest,
    /// Global id, assigned by the explorer.
    pub id: i64,
    /// Frozen encoding of the workload, as it was signed by the customer.
    pub json: String,
    /// Id of the customer owning the workload.
    pub customer_tid: i64,
    /// Signature of the customer over the workload.
    pub customer_signature: String,
    /// Lifecycle state as reported by the explorer.
    pub next_action: NextAction,
    /// Provisioning signatures collected so far.
    pub signatures_provision: Vec<SigningSignature>,
    /// Signature of the farmer.
    pub signature_farmer: SigningSignature,
    /// Deletion signatures collected so far.
    pub signatures_delete: Vec<SigningSignature>,
    /// Moment the workload was built.
    pub epoch: Date,
    /// Deadline for the workload to be provisioned.
    pub expiration_provisioning: Date,
    /// Free form metadata.
    pub metadata: String,
    /// Result reported by the node.
    pub result: WorkloadResult,
    /// Type tag of the workload.
    pub workload_type: WorkloadType,
}

impl ReservationInfo {
    /// Create an envelope for a new workload on the given node.
    pub fn new(workload_type: WorkloadType, node_id: String) -> Self {
        ReservationInfo {
            workload_id: 1,
            node_id,
            workload_type,
            ..Default::default()
        }
    }

    /// The challenge bytes of the envelope. Variant specific fields are appended to this.
    pub fn signature_challenge(&self) -> Challenge {
        let mut challenge = Challenge::new();
        challenge
            .push(self.customer_tid)
            .push(self.id)
            .push(self.workload_id)
            .push(self.pool_id)
            .push(&self.description)
            .push(&self.metadata)
            .push(self.epoch)
            .push(self.workload_type.name().to_uppercase())
            .push(&self.node_id)
            .push(self.expiration_provisioning);
        challenge
    }
}

/// State of a workload result as reported by a node.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
pub enum ResultState {
    /// Provisioning failed.
    #[default]
    Error = 0,
    /// The workload is deployed.
    Ok = 1,
    /// The workload has been removed from the node.
    Deleted = 2,
}

/// Outcome of a deployment, reported and signed by the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadResult {
    /// Type of the workload the result is for.
    pub category: WorkloadType,
    /// Global id of the workload the result is for.
    pub workload_id: String,
    /// Type specific result data.
    pub data_json: serde_json::Value,
    /// Signature of the node over the result.
    pub signature: String,
    /// The state of the workload.
    pub state: ResultState,
    /// Error message, if any.
    pub message: String,
    /// Moment the result was produced.
    pub epoch: Date,
    /// Id of the node which produced the result.
    pub node_id: String,
}
