pub mod audit_log;
pub mod authenticator;
pub mod freshness;
pub mod replay;
pub mod secret;
pub mod signature;
