pub mod client;
pub mod mock;
pub mod signature;

pub use client::HttpGateway;
pub use mock::MockGateway;
pub use signature::SignatureVerifier;
