//! Remote clients for the management APIs.

pub mod auth;
pub mod http;

pub use http::HttpFacade;
