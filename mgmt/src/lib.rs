#[macro_use]
extern crate tracing;

mod api;
mod client;
pub mod diagnostic;
mod error;
mod token;
mod upstream;

pub use api::{
    LocalVdc,
    NodeInfo,
    StoragePool,
};
pub use client::{
    read_json,
    AuthState,
    ClientSettings,
    MgmtClient,
    AUTH_TOKEN_HEADER,
    DEFAULT_PORT,
    MAX_ATTEMPTS,
};
pub use diagnostic::DtEntry;
pub use error::{
    ErrorKind,
    MgmtError,
};
pub use reqwest::{
    header::HeaderMap,
    Method,
    Response,
};
pub use token::Token;
pub use upstream::{
    split_host_port,
    Ecs,
    Vdc,
};
