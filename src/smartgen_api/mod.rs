pub mod cipher;
pub mod error;
pub mod models;
pub mod signer;
pub mod smartgen_client;
pub mod variant;
