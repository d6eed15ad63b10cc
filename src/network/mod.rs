//! Network communication layer.

pub mod rpc;
pub mod transport;

pub use rpc::{
    CacheRequest, CacheResponse, ClientRequest, ClientResponse, Message, RequestKind,
    ResponsePayload, ResponseStatus,
};
pub use transport::{TcpTransport, Transport};
