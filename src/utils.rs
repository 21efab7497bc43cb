use subtle::ConstantTimeEq;
use tracing::debug;

// For signature verification
use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

use crate::config::{Registry, WebhookConfig};

/// Computes the GitHub-style signature header value for a payload:
/// "sha256=" followed by the hex HMAC-SHA256 digest under `secret`.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Returns true if `signature_header` is the valid signature for `payload`
/// under `secret`. The comparison covers the whole header value, prefix
/// included, and is constant time so a partial prefix match costs the same
/// as no match at all.
pub fn signature_matches(secret: &str, payload: &[u8], signature_header: &str) -> bool {
    let Some(expected) = compute_signature(secret, payload) else {
        return false;
    };
    expected
        .as_bytes()
        .ct_eq(signature_header.as_bytes())
        .into()
}

/// Finds the first registry entry whose secret produces the received
/// signature, in load order. The signature header is treated as an opaque
/// string; an absent header is passed through as "" and never matches,
/// but every entry still goes through the constant-time compare.
pub fn find_matching_config_owned(
    registry: &Registry,
    payload: &[u8],
    signature_header: &str,
) -> Option<WebhookConfig> {
    let matched = registry
        .iter()
        .find(|config| signature_matches(&config.secret, payload, signature_header))
        .cloned();
    debug!("Signature lookup over {} entries", registry.len());
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployerConfig;

    fn test_registry() -> Registry {
        let toml = r#"
            [[webhook]]
            secret = "first-secret"
            repo_path = "/srv/first"
            restart_command = "systemctl restart first"
            branch = "main"

            [[webhook]]
            secret = "second-secret"
            repo_path = "/srv/second"
            restart_command = "systemctl restart second"
            branch = "develop"
        "#;
        DeployerConfig::from_toml_str(toml).unwrap().registry
    }

    #[test]
    fn valid_signature_finds_owning_config() {
        let registry = test_registry();
        let body = br#"{"ref":"refs/heads/develop"}"#;
        let header = compute_signature("second-secret", body).unwrap();
        let matched = find_matching_config_owned(&registry, body, &header).unwrap();
        assert_eq!(matched.repo_path, "/srv/second");
    }

    #[test]
    fn unknown_secret_matches_nothing() {
        let registry = test_registry();
        let body = b"payload";
        let header = compute_signature("not-registered", body).unwrap();
        assert!(find_matching_config_owned(&registry, body, &header).is_none());
    }

    #[test]
    fn empty_header_matches_nothing() {
        let registry = test_registry();
        assert!(find_matching_config_owned(&registry, b"payload", "").is_none());
    }

    #[test]
    fn tampered_body_fails_verification() {
        let header = compute_signature("first-secret", b"original").unwrap();
        assert!(!signature_matches("first-secret", b"tampered", &header));
    }

    #[test]
    fn signature_without_prefix_fails() {
        let body = b"payload";
        let header = compute_signature("first-secret", body).unwrap();
        let bare_hex = header.strip_prefix("sha256=").unwrap();
        assert!(!signature_matches("first-secret", body, bare_hex));
    }
}
