//! Download link claims.

use hangar_core::ids::{ArtifactId, DeploymentId, DeviceId, TenantId};
use time::OffsetDateTime;

/// Query parameter names carried by a signed download link.
pub const PARAM_TENANT_ID: &str = "tenant_id";
pub const PARAM_DEPLOYMENT_ID: &str = "deployment_id";
pub const PARAM_DEVICE_ID: &str = "device_id";
pub const PARAM_DEVICE_TYPE: &str = "device_type";
pub const PARAM_ARTIFACT_ID: &str = "artifact_id";
pub const PARAM_EXPIRE: &str = "x-dep-expire";
pub const PARAM_SIGNATURE: &str = "x-dep-signature";

/// The fixed claim set bound together by a link signature.
///
/// The signature covers exactly these fields plus the expiry; the set is
/// closed so a forged request cannot smuggle extra claims past the
/// verifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadClaims {
    pub tenant: TenantId,
    pub deployment_id: DeploymentId,
    pub device_id: DeviceId,
    pub device_type: String,
    pub artifact_id: ArtifactId,
    pub expire: OffsetDateTime,
}
