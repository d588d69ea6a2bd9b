//! Upload endpoints
//!
//! Each named endpoint owns a storage root and a profile that decides
//! whether uploads are decoded, scanned for submitter tags, and mailed
//! onward. The HTTP layer looks handlers up by name in the
//! [`EndpointRegistry`].

mod error;
pub mod handler;
pub mod registry;
pub mod types;

pub use error::UploadError;
pub use handler::{MailSettings, SharedServices, UploadHandler};
pub use registry::{EndpointRegistry, RegistryError};
pub use types::{EndpointProfile, TransportErrorCode, UploadReceipt, UploadRequest};
