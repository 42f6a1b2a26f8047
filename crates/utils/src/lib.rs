pub mod assets;
pub mod filter;
pub mod format;
pub mod response;
pub mod sentry;
