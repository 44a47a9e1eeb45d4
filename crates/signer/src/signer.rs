//! Signing and verification of download links.

use crate::claims::{
    DownloadClaims, PARAM_ARTIFACT_ID, PARAM_DEPLOYMENT_ID, PARAM_DEVICE_ID, PARAM_DEVICE_TYPE,
    PARAM_EXPIRE, PARAM_SIGNATURE, PARAM_TENANT_ID,
};
use crate::error::{SignerError, SignerResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hangar_core::Link;
use hangar_core::ids::{ArtifactId, DeploymentId, DeviceId, TenantId};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies expiring download links.
///
/// Pure and stateless: concurrent sign/verify calls share nothing but the
/// secret.
pub struct LinkSigner {
    secret: Vec<u8>,
}

impl LinkSigner {
    /// Create a signer from the shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produce a signed link for the claims, rooted at `base_url` with
    /// request path `path`.
    pub fn sign(&self, base_url: &str, path: &str, claims: &DownloadClaims) -> SignerResult<Link> {
        let expire = claims
            .expire
            .format(&Rfc3339)
            .map_err(|e| SignerError::InvalidLink(e.to_string()))?;

        let digest = self.digest(path, &RawClaims {
            tenant: claims.tenant.to_string(),
            deployment_id: claims.deployment_id.to_string(),
            device_id: claims.device_id.to_string(),
            device_type: claims.device_type.clone(),
            artifact_id: claims.artifact_id.to_string(),
            expire: expire.clone(),
        });
        let signature = URL_SAFE_NO_PAD.encode(digest);

        let mut url = Url::parse(base_url)
            .map_err(|e| SignerError::InvalidLink(format!("invalid base URL: {e}")))?;
        url.set_path(path);
        url.query_pairs_mut()
            .append_pair(PARAM_TENANT_ID, &claims.tenant.to_string())
            .append_pair(PARAM_DEPLOYMENT_ID, &claims.deployment_id.to_string())
            .append_pair(PARAM_DEVICE_ID, claims.device_id.as_str())
            .append_pair(PARAM_DEVICE_TYPE, &claims.device_type)
            .append_pair(PARAM_ARTIFACT_ID, &claims.artifact_id.to_string())
            .append_pair(PARAM_EXPIRE, &expire)
            .append_pair(PARAM_SIGNATURE, &signature);

        Ok(Link::new(url.to_string(), claims.expire))
    }

    /// Verify the query parameters of a download request against `path`.
    ///
    /// Returns the verified claims, or the failure class: missing
    /// security parameters are malformed requests, everything else that
    /// does not validate is rejected.
    pub fn verify(
        &self,
        path: &str,
        params: &HashMap<String, String>,
    ) -> SignerResult<DownloadClaims> {
        let signature = params
            .get(PARAM_SIGNATURE)
            .ok_or(SignerError::MissingParameter(PARAM_SIGNATURE))?;
        let expire_raw = params
            .get(PARAM_EXPIRE)
            .ok_or(SignerError::MissingParameter(PARAM_EXPIRE))?;

        let expire = OffsetDateTime::parse(expire_raw, &Rfc3339).map_err(|_| {
            SignerError::MalformedParameter(format!(
                "parameter '{PARAM_EXPIRE}' is not a valid timestamp"
            ))
        })?;
        if OffsetDateTime::now_utc() > expire {
            return Err(SignerError::Expired);
        }

        // Recompute over the received parameters; an absent claim hashes
        // as empty and fails the comparison.
        let get = |key: &str| params.get(key).cloned().unwrap_or_default();
        let raw = RawClaims {
            tenant: get(PARAM_TENANT_ID),
            deployment_id: get(PARAM_DEPLOYMENT_ID),
            device_id: get(PARAM_DEVICE_ID),
            device_type: get(PARAM_DEVICE_TYPE),
            artifact_id: get(PARAM_ARTIFACT_ID),
            expire: expire_raw.clone(),
        };

        let supplied = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignerError::Rejected)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SignerError::InvalidLink(e.to_string()))?;
        mac.update(&self.canonical(path, &raw));
        // Constant-time comparison.
        mac.verify_slice(&supplied).map_err(|_| SignerError::Rejected)?;

        Ok(DownloadClaims {
            tenant: TenantId::parse(&raw.tenant).map_err(|_| SignerError::Rejected)?,
            deployment_id: DeploymentId::parse(&raw.deployment_id)
                .map_err(|_| SignerError::Rejected)?,
            device_id: DeviceId::parse(&raw.device_id).map_err(|_| SignerError::Rejected)?,
            device_type: raw.device_type,
            artifact_id: ArtifactId::parse(&raw.artifact_id).map_err(|_| SignerError::Rejected)?,
            expire,
        })
    }

    /// The canonical byte string covered by the signature, in fixed
    /// parameter order, expiry included.
    fn canonical(&self, path: &str, claims: &RawClaims) -> Vec<u8> {
        format!(
            "GET\n{path}\n\
             {PARAM_TENANT_ID}={}\n\
             {PARAM_DEPLOYMENT_ID}={}\n\
             {PARAM_DEVICE_ID}={}\n\
             {PARAM_DEVICE_TYPE}={}\n\
             {PARAM_ARTIFACT_ID}={}\n\
             {PARAM_EXPIRE}={}\n",
            claims.tenant,
            claims.deployment_id,
            claims.device_id,
            claims.device_type,
            claims.artifact_id,
            claims.expire,
        )
        .into_bytes()
    }

    fn digest(&self, path: &str, claims: &RawClaims) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(&self.canonical(path, claims));
        mac.finalize().into_bytes().to_vec()
    }
}

/// Claim values as they appear on the wire, before parsing.
struct RawClaims {
    tenant: String,
    deployment_id: String,
    device_id: String,
    device_type: String,
    artifact_id: String,
    expire: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    const PATH: &str = "/api/devices/v1/deployments/download";

    fn signer() -> LinkSigner {
        LinkSigner::new("a very well kept secret")
    }

    fn claims() -> DownloadClaims {
        DownloadClaims {
            tenant: TenantId::new(),
            deployment_id: DeploymentId::new(),
            device_id: DeviceId::parse("device-7").unwrap(),
            device_type: "rpi4".to_string(),
            artifact_id: ArtifactId::new(),
            expire: OffsetDateTime::now_utc() + Duration::hours(1),
        }
    }

    fn params_of(link: &Link) -> HashMap<String, String> {
        let url = Url::parse(&link.uri).unwrap();
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let signer = signer();
        let claims = claims();
        let link = signer.sign("http://localhost:8080", PATH, &claims).unwrap();
        let params = params_of(&link);

        let verified = signer.verify(PATH, &params).unwrap();
        assert_eq!(verified.tenant, claims.tenant);
        assert_eq!(verified.deployment_id, claims.deployment_id);
        assert_eq!(verified.device_id, claims.device_id);
        assert_eq!(verified.device_type, claims.device_type);
        assert_eq!(verified.artifact_id, claims.artifact_id);
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let signer = signer();
        let link = signer.sign("http://localhost:8080", PATH, &claims()).unwrap();
        let params = params_of(&link);

        for param in [
            PARAM_TENANT_ID,
            PARAM_DEPLOYMENT_ID,
            PARAM_DEVICE_ID,
            PARAM_DEVICE_TYPE,
            PARAM_ARTIFACT_ID,
        ] {
            let mut tampered = params.clone();
            tampered.insert(param.to_string(), "altered".to_string());
            assert!(
                matches!(signer.verify(PATH, &tampered), Err(SignerError::Rejected)),
                "altering '{param}' must be rejected"
            );
        }
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let signer = signer();
        let link = signer.sign("http://localhost:8080", PATH, &claims()).unwrap();
        let mut params = params_of(&link);
        let signature = params.get_mut(PARAM_SIGNATURE).unwrap();
        *signature = format!("{signature}x");
        assert!(matches!(signer.verify(PATH, &params), Err(SignerError::Rejected)));
    }

    #[test]
    fn test_missing_security_parameters() {
        let signer = signer();
        let link = signer.sign("http://localhost:8080", PATH, &claims()).unwrap();
        let params = params_of(&link);

        let mut without_signature = params.clone();
        without_signature.remove(PARAM_SIGNATURE);
        assert!(matches!(
            signer.verify(PATH, &without_signature),
            Err(SignerError::MissingParameter(PARAM_SIGNATURE))
        ));

        let mut without_expire = params;
        without_expire.remove(PARAM_EXPIRE);
        assert!(matches!(
            signer.verify(PATH, &without_expire),
            Err(SignerError::MissingParameter(PARAM_EXPIRE))
        ));
    }

    #[test]
    fn test_expired_link() {
        let signer = signer();
        let mut expired = claims();
        expired.expire = OffsetDateTime::now_utc() - Duration::minutes(1);
        let link = signer.sign("http://localhost:8080", PATH, &expired).unwrap();
        assert!(matches!(
            signer.verify(PATH, &params_of(&link)),
            Err(SignerError::Expired)
        ));
    }

    #[test]
    fn test_wrong_path_rejected() {
        let signer = signer();
        let link = signer.sign("http://localhost:8080", PATH, &claims()).unwrap();
        assert!(matches!(
            signer.verify("/some/other/path", &params_of(&link)),
            Err(SignerError::Rejected)
        ));
    }

    #[test]
    fn test_different_secret_rejected() {
        let link = signer().sign("http://localhost:8080", PATH, &claims()).unwrap();
        let other = LinkSigner::new("another secret entirely");
        assert!(matches!(
            other.verify(PATH, &params_of(&link)),
            Err(SignerError::Rejected)
        ));
    }
}
