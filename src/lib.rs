//! Optional TLS transport credentials for a single listening port.

pub mod admin;
pub mod config;
pub mod credentials;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod rpc;

pub use config::schema::ServerConfig;
pub use credentials::{InsecureCredentials, OptionalTlsCredentials, TlsCredentials, TransportCredentials};
pub use lifecycle::Shutdown;
pub use policy::{PolicySwitch, TlsPolicy};
pub use rpc::{GreeterClient, RpcServer};
