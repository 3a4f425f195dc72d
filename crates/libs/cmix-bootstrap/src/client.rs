//! The network client the bootstrap drives.

use std::path::Path;

use cmix_dm::InstanceId;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Opaque handle to a loaded client, identified by the instance id the
/// client assigned. Handler sets are registered under the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientHandle {
    pub instance_id: InstanceId,
}

impl ClientHandle {
    pub fn new(instance_id: InstanceId) -> Self {
        Self { instance_id }
    }
}

/// Operations of the underlying cMix client used during bootstrap.
///
/// Every method is a synchronous call into the client; failures are reported
/// as an opaque [`ClientError`] and classified by the phase that made the call.
pub trait NetworkClient {
    /// Download the NDF from `url` and verify its signature against `certificate`.
    fn download_and_verify_ndf(&self, url: &str, certificate: &[u8])
        -> Result<Vec<u8>, ClientError>;

    /// Create encrypted client state in `state_dir`, which already exists and is empty.
    fn create_state(
        &self,
        ndf: &[u8],
        state_dir: &Path,
        secret: &[u8],
        registration_code: &str,
    ) -> Result<(), ClientError>;

    fn load_state(
        &self,
        state_dir: &Path,
        secret: &[u8],
        params_json: &[u8],
    ) -> Result<ClientHandle, ClientError>;

    /// Fetch a stored reception identity. `Ok(None)` means nothing is stored under `key`.
    fn load_identity(&self, handle: &ClientHandle, key: &str)
        -> Result<Option<Vec<u8>>, ClientError>;

    fn create_identity(&self, handle: &ClientHandle, secret: &[u8]) -> Result<Vec<u8>, ClientError>;

    fn store_identity(
        &self,
        handle: &ClientHandle,
        key: &str,
        identity: &[u8],
    ) -> Result<(), ClientError>;

    /// Derive the shareable contact for a reception identity.
    fn derive_contact(&self, identity: &[u8]) -> Result<Vec<u8>, ClientError>;
}
