pub mod factory;
pub mod local;
pub mod provider;
pub mod service;
pub mod upload;

#[cfg(feature = "azure")]
pub mod azure;

pub use service::FileShareService;
