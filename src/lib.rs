//! # clearance-pool
//!
//! Keeps a Cloudflare clearance cookie and a pool of outbound relays ready for
//! request pipelines that talk to a protected service.
//!
//! Two components make up the crate:
//!
//! - [`ClearanceAcquirer`] drives a browser-capable transport across an
//!   ordered list of acquisition strategies until one of them yields the
//!   `cf_clearance` cookie, then persists it through a [`ConfigStore`].
//!   Concurrent refreshes collapse into a single sweep.
//! - [`ProxyPoolManager`] pulls candidate relays from a third-party
//!   directory, optionally probes each one against a health endpoint, and
//!   swaps the in-memory pool atomically.
//!
//! Both components receive their collaborators (transport, directory, store)
//! at construction, so tests and embedders can swap in their own.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clearance_pool::{
//!     ClearanceAcquirer, ClearanceSettings, FileConfigStore, ReqwestBrowserTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileConfigStore::new("data/setting.toml"));
//!     let transport = Arc::new(ReqwestBrowserTransport::new());
//!     let acquirer = ClearanceAcquirer::new(ClearanceSettings::default(), transport, store);
//!     acquirer.hydrate().await?;
//!
//!     if let Some(token) = acquirer.ensure().await {
//!         println!("cf_clearance={token}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod clearance;
pub mod config;
pub mod proxy;
pub mod store;
pub mod transport;

pub use crate::clearance::{
    AcquisitionStrategy,
    ClearanceAcquirer,
    ClearanceError,
    ClearanceState,
    EndpointKind,
    default_strategies,
    header_preset,
    mask_relay,
};

pub use crate::config::{
    ClearanceSettings,
    ClearanceSettingsBuilder,
    ProxyPoolSettings,
    ServiceEndpoints,
    SettingsError,
};

pub use crate::proxy::{
    DirectoryData,
    DirectoryError,
    DirectoryPayload,
    ProxyCandidate,
    ProxyDirectory,
    ProxyPoolManager,
    ProxyProtocol,
    ReqwestProxyDirectory,
    RotationStrategy,
};

pub use crate::store::{
    ConfigSection,
    ConfigStore,
    ConfigStoreError,
    FileConfigStore,
    MemoryConfigStore,
};

pub use crate::transport::{
    BrowserProfile,
    BrowserRequest,
    BrowserResponse,
    BrowserSession,
    BrowserTransport,
    CookieJar,
    ProfileFamily,
    ReqwestBrowserTransport,
    SessionCookie,
    TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
