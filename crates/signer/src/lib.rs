//! Signed, expiring download links for the hangar deployment service.
//!
//! This crate provides:
//! - The fixed claim set bound into every download link
//! - HMAC-SHA256 link signing
//! - Constant-time verification with a typed failure taxonomy

pub mod claims;
pub mod error;
pub mod signer;

pub use claims::{
    DownloadClaims, PARAM_ARTIFACT_ID, PARAM_DEPLOYMENT_ID, PARAM_DEVICE_ID, PARAM_DEVICE_TYPE,
    PARAM_EXPIRE, PARAM_SIGNATURE, PARAM_TENANT_ID,
};
pub use error::{SignerError, SignerResult};
pub use signer::LinkSigner;
