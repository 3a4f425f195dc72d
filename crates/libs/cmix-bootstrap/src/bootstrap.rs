//! The bootstrap state machine.
//!
//! ```text
//! Start ─┬─> LoadState ──> LoadIdentity ─┬─> DeriveContact ──> Ready
//!        │       ^                       └─> CreateIdentity ──> StoreIdentity ──┘
//!        └─> NeedNdf ─┬─> CreateState ─┘
//!                     └─> DownloadNdf ──> CreateState
//! ```
//!
//! Every phase that can fail has exactly one [`BootstrapError`] variant and
//! moves to `Failed`. Nothing is retried.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::client::{ClientHandle, NetworkClient};
use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::state::{ClientState, Ndf};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPhase {
    Start,
    NeedNdf,
    DownloadNdf,
    CreateState,
    LoadState,
    LoadIdentity,
    CreateIdentity,
    StoreIdentity,
    DeriveContact,
    Ready,
    Failed,
}

impl BootstrapPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::NeedNdf => "need_ndf",
            Self::DownloadNdf => "download_ndf",
            Self::CreateState => "create_state",
            Self::LoadState => "load_state",
            Self::LoadIdentity => "load_identity",
            Self::CreateIdentity => "create_identity",
            Self::StoreIdentity => "store_identity",
            Self::DeriveContact => "derive_contact",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bootstrap state together with what earlier phases produced.
#[derive(Debug)]
pub enum BootstrapState {
    Start,
    NeedNdf,
    DownloadNdf,
    CreateState { ndf: Ndf },
    LoadState { ndf: Option<Ndf> },
    LoadIdentity { ndf: Option<Ndf>, handle: ClientHandle },
    CreateIdentity { ndf: Option<Ndf>, handle: ClientHandle },
    StoreIdentity { ndf: Option<Ndf>, handle: ClientHandle, identity: Vec<u8> },
    DeriveContact { ndf: Option<Ndf>, handle: ClientHandle, identity: Vec<u8> },
    Ready(Box<ClientState>),
    Failed(BootstrapError),
}

impl BootstrapState {
    pub fn phase(&self) -> BootstrapPhase {
        match self {
            Self::Start => BootstrapPhase::Start,
            Self::NeedNdf => BootstrapPhase::NeedNdf,
            Self::DownloadNdf => BootstrapPhase::DownloadNdf,
            Self::CreateState { .. } => BootstrapPhase::CreateState,
            Self::LoadState { .. } => BootstrapPhase::LoadState,
            Self::LoadIdentity { .. } => BootstrapPhase::LoadIdentity,
            Self::CreateIdentity { .. } => BootstrapPhase::CreateIdentity,
            Self::StoreIdentity { .. } => BootstrapPhase::StoreIdentity,
            Self::DeriveContact { .. } => BootstrapPhase::DeriveContact,
            Self::Ready(_) => BootstrapPhase::Ready,
            Self::Failed(_) => BootstrapPhase::Failed,
        }
    }
}

/// Drives a [`NetworkClient`] from nothing to a loaded client with a
/// reception identity.
pub struct Bootstrapper<'a, C: NetworkClient + ?Sized> {
    client: &'a C,
    config: BootstrapConfig,
    secret: Zeroizing<Vec<u8>>,
    trace: Vec<BootstrapPhase>,
}

impl<'a, C: NetworkClient + ?Sized> Bootstrapper<'a, C> {
    pub fn new(client: &'a C, config: BootstrapConfig, secret: &[u8]) -> Self {
        Self { client, config, secret: Zeroizing::new(secret.to_vec()), trace: Vec::new() }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Phases visited by the last [`run`](Self::run), terminal phase included.
    pub fn trace(&self) -> &[BootstrapPhase] {
        &self.trace
    }

    pub fn run(&mut self) -> Result<ClientState, BootstrapError> {
        self.trace.clear();
        let mut state = BootstrapState::Start;
        loop {
            state = match state {
                BootstrapState::Ready(client_state) => {
                    self.trace.push(BootstrapPhase::Ready);
                    log::info!(
                        "bootstrap ready: instance {} in {}",
                        client_state.handle.instance_id,
                        client_state.state_directory.display()
                    );
                    return Ok(*client_state);
                }
                BootstrapState::Failed(err) => {
                    self.trace.push(BootstrapPhase::Failed);
                    log::error!("bootstrap failed in {}: {err}", err.phase());
                    return Err(err);
                }
                other => self.step(other),
            };
        }
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub fn step(&mut self, state: BootstrapState) -> BootstrapState {
        let phase = state.phase();
        if !phase.is_terminal() {
            self.trace.push(phase);
        }
        let next = match state {
            BootstrapState::Start => self.start(),
            BootstrapState::NeedNdf => self.need_ndf(),
            BootstrapState::DownloadNdf => self.download_ndf(),
            BootstrapState::CreateState { ndf } => self.create_state(ndf),
            BootstrapState::LoadState { ndf } => self.load_state(ndf),
            BootstrapState::LoadIdentity { ndf, handle } => self.load_identity(ndf, handle),
            BootstrapState::CreateIdentity { ndf, handle } => self.create_identity(ndf, handle),
            BootstrapState::StoreIdentity { ndf, handle, identity } => {
                self.store_identity(ndf, handle, identity)
            }
            BootstrapState::DeriveContact { ndf, handle, identity } => {
                self.derive_contact(ndf, handle, identity)
            }
            terminal @ (BootstrapState::Ready(_) | BootstrapState::Failed(_)) => terminal,
        };
        if next.phase() != phase {
            log::info!("bootstrap {phase} -> {}", next.phase());
        }
        next
    }

    fn start(&self) -> BootstrapState {
        if self.config.state_dir.exists() {
            BootstrapState::LoadState { ndf: None }
        } else {
            BootstrapState::NeedNdf
        }
    }

    fn need_ndf(&self) -> BootstrapState {
        match fs::read(&self.config.ndf_path) {
            Ok(raw) => match Ndf::parse(raw) {
                Ok(ndf) => BootstrapState::CreateState { ndf },
                Err(message) => BootstrapState::Failed(BootstrapError::StateInit {
                    dir: self.config.state_dir.clone(),
                    message: format!("{}: {message}", self.config.ndf_path.display()),
                }),
            },
            Err(err) => {
                log::info!(
                    "no local ndf at {} ({err}), falling back to download",
                    self.config.ndf_path.display()
                );
                BootstrapState::DownloadNdf
            }
        }
    }

    fn download_ndf(&self) -> BootstrapState {
        let certificate = match fs::read(&self.config.cert_path) {
            Ok(certificate) if !certificate.is_empty() => certificate,
            _ => {
                return BootstrapState::Failed(BootstrapError::MissingCertificate {
                    path: self.config.cert_path.clone(),
                })
            }
        };
        let downloaded = self
            .client
            .download_and_verify_ndf(&self.config.ndf_url, &certificate)
            .map_err(|err| err.message)
            .and_then(Ndf::parse);
        match downloaded {
            Ok(ndf) => BootstrapState::CreateState { ndf },
            Err(message) => BootstrapState::Failed(BootstrapError::Download { message }),
        }
    }

    fn create_state(&self, ndf: Ndf) -> BootstrapState {
        let dir = &self.config.state_dir;
        let state_init = |message: String| {
            BootstrapState::Failed(BootstrapError::StateInit { dir: dir.clone(), message })
        };

        let created_parents = match create_missing_parents(dir) {
            Ok(created) => created,
            Err(err) => return state_init(format!("creating parent directory: {err}")),
        };
        // Non-recursive so an existing directory is never overwritten.
        if let Err(err) = fs::create_dir(dir) {
            remove_created_parents(&created_parents);
            return state_init(format!("creating state directory: {err}"));
        }

        match self.client.create_state(
            ndf.as_bytes(),
            dir,
            &self.secret,
            &self.config.registration_code,
        ) {
            Ok(()) => BootstrapState::LoadState { ndf: Some(ndf) },
            Err(err) => {
                if let Err(cleanup) = remove_partial_state(dir) {
                    log::warn!("failed to remove partial state {}: {cleanup}", dir.display());
                }
                remove_created_parents(&created_parents);
                state_init(err.message)
            }
        }
    }

    fn load_state(&self, ndf: Option<Ndf>) -> BootstrapState {
        let params = self.config.cmix_params_json();
        match self.client.load_state(&self.config.state_dir, &self.secret, &params) {
            Ok(handle) => BootstrapState::LoadIdentity { ndf, handle },
            Err(err) => BootstrapState::Failed(BootstrapError::StateLoad { message: err.message }),
        }
    }

    fn load_identity(&self, ndf: Option<Ndf>, handle: ClientHandle) -> BootstrapState {
        match self.client.load_identity(&handle, &self.config.identity_key) {
            Ok(Some(identity)) if !identity.is_empty() => {
                BootstrapState::DeriveContact { ndf, handle, identity }
            }
            Ok(_) => BootstrapState::CreateIdentity { ndf, handle },
            Err(err) => {
                log::warn!(
                    "could not load identity {:?}, generating a new one: {err}",
                    self.config.identity_key
                );
                BootstrapState::CreateIdentity { ndf, handle }
            }
        }
    }

    fn create_identity(&self, ndf: Option<Ndf>, handle: ClientHandle) -> BootstrapState {
        match self.client.create_identity(&handle, &self.secret) {
            Ok(identity) => BootstrapState::StoreIdentity { ndf, handle, identity },
            Err(err) => identity_failure(BootstrapPhase::CreateIdentity, err.message),
        }
    }

    fn store_identity(
        &self,
        ndf: Option<Ndf>,
        handle: ClientHandle,
        identity: Vec<u8>,
    ) -> BootstrapState {
        match self.client.store_identity(&handle, &self.config.identity_key, &identity) {
            Ok(()) => BootstrapState::DeriveContact { ndf, handle, identity },
            Err(err) => identity_failure(BootstrapPhase::StoreIdentity, err.message),
        }
    }

    fn derive_contact(
        &self,
        ndf: Option<Ndf>,
        handle: ClientHandle,
        identity: Vec<u8>,
    ) -> BootstrapState {
        match self.client.derive_contact(&identity) {
            Ok(contact) => BootstrapState::Ready(Box::new(ClientState {
                state_directory: self.config.state_dir.clone(),
                secret: self.secret.clone(),
                ndf,
                handle,
                reception_identity: identity,
                contact,
            })),
            Err(err) => identity_failure(BootstrapPhase::DeriveContact, err.message),
        }
    }
}

fn identity_failure(phase: BootstrapPhase, message: String) -> BootstrapState {
    BootstrapState::Failed(BootstrapError::Identity { phase, message })
}

/// Create the missing ancestors of `dir`, outermost first, and return the
/// ones this call created so a failed bootstrap can take them back.
fn create_missing_parents(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .skip(1)
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();

    let mut created = Vec::with_capacity(missing.len());
    for parent in missing {
        if let Err(err) = fs::create_dir(&parent) {
            if err.kind() != io::ErrorKind::AlreadyExists {
                remove_created_parents(&created);
                return Err(err);
            }
            continue;
        }
        created.push(parent);
    }
    Ok(created)
}

/// Innermost first; a directory something else has written into stays.
fn remove_created_parents(created: &[PathBuf]) {
    for parent in created.iter().rev() {
        if let Err(err) = fs::remove_dir(parent) {
            log::warn!("leaving parent directory {}: {err}", parent.display());
        }
    }
}

fn remove_partial_state(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
