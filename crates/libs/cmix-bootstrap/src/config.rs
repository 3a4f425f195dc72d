use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

use cmix_dm::{ConfigError, RouterConfig};

pub const MAINNET_NDF_URL: &str =
    "https://elixxir-bins.s3.us-west-1.amazonaws.com/ndf/mainnet.json";
pub const DEFAULT_IDENTITY_KEY: &str = "MyDMID";

/// Where the bootstrap looks for state, the NDF and its certificate.
///
/// The client secret is deliberately absent; it is handed to
/// [`Bootstrapper::new`](crate::Bootstrapper::new) by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    pub state_dir: PathBuf,
    pub ndf_path: PathBuf,
    pub cert_path: PathBuf,
    pub ndf_url: String,
    /// Key the reception identity is stored under in the client's key-value store.
    pub identity_key: String,
    pub registration_code: String,
    /// Client parameters passed through to `load_state`. `None` means the
    /// client's defaults.
    pub cmix_params: Option<JsonValue>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("statePath"),
            ndf_path: PathBuf::from("mainnet.json"),
            cert_path: PathBuf::from("mainnet.crt"),
            ndf_url: MAINNET_NDF_URL.to_owned(),
            identity_key: DEFAULT_IDENTITY_KEY.to_owned(),
            registration_code: String::new(),
            cmix_params: None,
        }
    }
}

impl BootstrapConfig {
    /// The parameters as the JSON bytes `load_state` expects; empty when unset.
    pub fn cmix_params_json(&self) -> Vec<u8> {
        match &self.cmix_params {
            Some(params) => params.to_string().into_bytes(),
            None => Vec::new(),
        }
    }
}

/// A whole client config file: `[router]` and `[bootstrap]` tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub router: RouterConfig,
    pub bootstrap: BootstrapConfig,
}

impl ClientConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&contents)
    }
}
