//! Records returned to callers and persisted in the metadata store.
//!
//! Field names follow the JSON used by the wider credential platform
//! (`authToken`, `edvDocURI`, `authTokens`, …), so records written by one
//! client can be read by another.

use serde::{Deserialize, Serialize};
use vcvault_capabilities::Caveat;

/// A remote resource together with the capability that unlocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Absolute resource URI.
    pub uri: String,
    /// Compressed capability for the resource.
    pub auth_token: String,
}

/// The vault's own access to its key store and data vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Data vault location.
    pub edv: Location,
    /// Key store location.
    pub kms: Location,
}

/// Result of provisioning a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVault {
    /// Vault id, a `did:key`.
    pub id: String,
    /// Root capabilities of the vault.
    #[serde(flatten)]
    pub authorization: Authorization,
}

/// Persisted vault record, written once on provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    /// Key-manager id of the vault's signing key.
    #[serde(rename = "kid")]
    pub signing_key_id: String,
    /// Root capabilities of the vault.
    #[serde(rename = "auth")]
    pub authorization: Authorization,
}

/// Persisted per-document record.
///
/// `edv_doc_id` is fixed the first time a document is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetaInfo {
    /// Id of the document inside the EDV.
    #[serde(rename = "edv_id")]
    pub edv_doc_id: String,
    /// KMS URL of the document's content key.
    #[serde(rename = "kid_url")]
    pub key_uri: String,
}

/// Where a document lives and which key protects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Caller-chosen document id.
    #[serde(rename = "docID")]
    pub doc_id: String,
    /// EDV document URI.
    #[serde(rename = "edvDocURI")]
    pub document_uri: String,
    /// KMS URL of the content key.
    #[serde(rename = "encKeyURI")]
    pub key_uri: String,
}

/// What an authorization grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Document the grant is about.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    /// Attribute of the target the grant is about.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_attr: String,
    /// EDV actions granted (`read`, `write`), each at most once.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Caveats copied onto both delegated capabilities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<Caveat>,
}

impl Scope {
    /// A scope granting `actions` with no target or caveats.
    #[must_use]
    pub fn with_actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a caveat.
    #[must_use]
    pub fn with_caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }

    /// Set the target document.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

/// Compressed capabilities handed to a requesting party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Delegated EDV capability.
    pub edv: String,
    /// Delegated KMS capability.
    pub kms: String,
}

/// A persisted grant to a third party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAuthorization {
    /// Authorization id.
    pub id: String,
    /// What was granted.
    pub scope: Scope,
    /// DID of the grantee, as given by the caller.
    pub requesting_party: String,
    /// The delegated capabilities.
    #[serde(rename = "authTokens")]
    pub tokens: Tokens,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn authorization() -> Authorization {
        Authorization {
            edv: Location {
                uri: "https://edv.example.com/encrypted-data-vaults/v1".into(),
                auth_token: "H4sIedv".into(),
            },
            kms: Location {
                uri: "https://kms.example.com/kms/keystores/ks1".into(),
                auth_token: "H4sIkms".into(),
            },
        }
    }

    #[test]
    fn test_vault_info_wire_format() {
        let info = VaultInfo {
            signing_key_id: "kid1".into(),
            authorization: authorization(),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["kid"], "kid1");
        assert_eq!(value["auth"]["edv"]["authToken"], "H4sIedv");
        assert_eq!(value["auth"]["kms"]["uri"], "https://kms.example.com/kms/keystores/ks1");
    }

    #[test]
    fn test_created_vault_flattens_authorization() {
        let vault = CreatedVault {
            id: "did:key:z6Mk".into(),
            authorization: authorization(),
        };
        let value = serde_json::to_value(&vault).unwrap();
        assert_eq!(value["id"], "did:key:z6Mk");
        assert_eq!(value["kms"]["authToken"], "H4sIkms");
        assert!(value.get("authorization").is_none());
    }

    #[test]
    fn test_document_metadata_wire_format() {
        let meta = DocumentMetadata {
            doc_id: "doc1".into(),
            document_uri: "https://edv.example.com/encrypted-data-vaults/v1/documents/abc".into(),
            key_uri: "https://kms.example.com/kms/keystores/ks1/keys/k1".into(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["docID"], "doc1");
        assert!(value["edvDocURI"].as_str().unwrap().ends_with("/documents/abc"));
        assert!(value["encKeyURI"].as_str().unwrap().ends_with("/keys/k1"));

        let record: DocMetaInfo =
            serde_json::from_value(json!({"edv_id": "abc", "kid_url": "https://k"})).unwrap();
        assert_eq!(record.edv_doc_id, "abc");
    }

    #[test]
    fn test_scope_omits_empty_fields() {
        let scope = Scope::with_actions(["read"]);
        assert_eq!(serde_json::to_value(&scope).unwrap(), json!({"actions": ["read"]}));

        let parsed: Scope = serde_json::from_value(json!({
            "target": "doc1",
            "caveats": [{"type": "zcap-expiry", "duration": 600}]
        }))
        .unwrap();
        assert_eq!(parsed.target, "doc1");
        assert!(parsed.actions.is_empty());
        assert_eq!(parsed.caveats[0].duration, 600);
    }

    #[test]
    fn test_authorization_uses_auth_tokens_key() {
        let auth = CreatedAuthorization {
            id: "a1".into(),
            scope: Scope::with_actions(["read"]),
            requesting_party: "did:key:z6MkRp".into(),
            tokens: Tokens {
                edv: "e".into(),
                kms: "k".into(),
            },
        };
        let value = serde_json::to_value(&auth).unwrap();
        assert_eq!(value["requestingParty"], "did:key:z6MkRp");
        assert_eq!(value["authTokens"], json!({"edv": "e", "kms": "k"}));
    }
}
