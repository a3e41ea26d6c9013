pub mod revocation;
pub mod token_service;
