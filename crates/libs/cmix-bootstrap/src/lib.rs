//! Bootstrap of a cMix DM client.
//!
//! A [`Bootstrapper`] takes a fresh or existing state directory to a loaded
//! client with a reception identity, calling into the network client through
//! the [`NetworkClient`] trait. The resulting [`ClientState`] carries the
//! client's instance id, which is the id its handler set is registered under
//! in a [`cmix_dm::CallbackRouter`].

pub mod bootstrap;
pub mod client;
pub mod config;
mod error;
pub mod state;

pub use bootstrap::{BootstrapPhase, BootstrapState, Bootstrapper};
pub use client::{ClientHandle, NetworkClient};
pub use config::{BootstrapConfig, ClientConfig, DEFAULT_IDENTITY_KEY, MAINNET_NDF_URL};
pub use error::{BootstrapError, ClientError};
pub use state::{ClientState, Ndf};

/// Run a complete bootstrap.
pub fn bootstrap<C: NetworkClient + ?Sized>(
    client: &C,
    config: BootstrapConfig,
    secret: &[u8],
) -> Result<ClientState, BootstrapError> {
    Bootstrapper::new(client, config, secret).run()
}
