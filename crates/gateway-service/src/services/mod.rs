pub mod path;
pub mod proxy;
pub mod registry;

pub use proxy::{ProxyForwarder, ProxySettings};
pub use registry::BackendRegistry;
