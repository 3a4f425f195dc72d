use std::fmt;
use std::path::PathBuf;

use serde_json::Value as JsonValue;
use zeroize::Zeroizing;

use crate::client::ClientHandle;

/// A network definition file: the raw signed bytes and their parsed document.
#[derive(Clone, Debug, PartialEq)]
pub struct Ndf {
    raw: Vec<u8>,
    document: JsonValue,
}

impl Ndf {
    /// Accept `raw` only if it is a JSON object.
    pub fn parse(raw: Vec<u8>) -> Result<Self, String> {
        let document: JsonValue =
            serde_json::from_slice(&raw).map_err(|err| format!("ndf is not valid json: {err}"))?;
        if !document.is_object() {
            return Err("ndf is not a json object".to_owned());
        }
        Ok(Self { raw, document })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn document(&self) -> &JsonValue {
        &self.document
    }
}

/// Everything a successful bootstrap produces.
pub struct ClientState {
    pub state_directory: PathBuf,
    pub secret: Zeroizing<Vec<u8>>,
    /// Present only when the state was created during this run.
    pub ndf: Option<Ndf>,
    pub handle: ClientHandle,
    pub reception_identity: Vec<u8>,
    pub contact: Vec<u8>,
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientState")
            .field("state_directory", &self.state_directory)
            .field("secret", &"<redacted>")
            .field("ndf", &self.ndf.as_ref().map(|ndf| ndf.as_bytes().len()))
            .field("handle", &self.handle)
            .field("reception_identity_len", &self.reception_identity.len())
            .field("contact_len", &self.contact.len())
            .finish()
    }
}
