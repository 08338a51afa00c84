use thiserror::Error;

use crate::xmlrpc::decoding::ProtocolError;
use crate::xmlrpc::encoding::EncodeError;
use crate::xmlrpc::fault::Fault;
use crate::xmlrpc::transport::TransportError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("XML-RPC call {method:?} to {url} failed to connect: {source}")]
    Connectivity {
        method: String,
        url: String,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("could not encode request: {0}")]
    Encode(#[from] EncodeError),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Transport(TransportError),
    /// A fault returned for a whole multicall batch rather than one entry.
    #[error(transparent)]
    Fault(Fault),
}

pub type Result<T> = std::result::Result<T, Error>;
