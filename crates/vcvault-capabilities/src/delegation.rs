//! Delegating narrower capabilities from a vault's root capabilities.
//!
//! Each vault owns two root capabilities, one for its key store and one for
//! its data vault. A third party is granted access by delegating a child of
//! each, with the action set decided by the [`ResourceKind`]:
//!
//! | Kind | Actions granted |
//! |------|-----------------|
//! | [`ResourceKind::KeyStore`] | always `unwrap` (decrypt, never manage keys) |
//! | [`ResourceKind::Vault`] | exactly the requested actions, which must be a subset of the parent's |

use std::fmt;

use uuid::Uuid;
use vcvault_crypto::KeyPair;

use crate::capability::{Capability, Caveat, InvocationTarget, SECURITY_CONTEXT};
use crate::error::{CapabilityError, CapabilityResult};
use crate::invocation::actions;

/// The kind of resource a delegation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Remote key store (KMS).
    KeyStore,
    /// Remote encrypted data vault (EDV).
    Vault,
}

impl ResourceKind {
    /// Short name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeyStore => "kms",
            Self::Vault => "edv",
        }
    }

    /// The actions a child of `parent` receives for a `requested` action set.
    ///
    /// Order of `requested` is preserved.
    ///
    /// # Errors
    ///
    /// For [`ResourceKind::Vault`], returns
    /// [`CapabilityError::InvalidDelegation`] if no action is requested or an
    /// action is requested twice, and [`CapabilityError::ActionNotAllowed`]
    /// if an action is outside the parent's set.
    pub fn delegated_actions(
        self,
        parent: &Capability,
        requested: &[String],
    ) -> CapabilityResult<Vec<String>> {
        match self {
            Self::KeyStore => Ok(vec![actions::UNWRAP.to_string()]),
            Self::Vault => {
                if requested.is_empty() {
                    return Err(CapabilityError::InvalidDelegation(
                        "at least one action must be requested".into(),
                    ));
                }
                let mut granted: Vec<String> = Vec::with_capacity(requested.len());
                for action in requested {
                    if !parent.allows(action) {
                        return Err(CapabilityError::ActionNotAllowed {
                            action: action.clone(),
                            parent: parent.id.clone(),
                        });
                    }
                    if granted.contains(action) {
                        return Err(CapabilityError::InvalidDelegation(format!(
                            "action {action} requested more than once"
                        )));
                    }
                    granted.push(action.clone());
                }
                Ok(granted)
            },
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn a server-relative id (`/kms/keystores/…`) into an absolute URL.
///
/// Absolute ids and ids that are not paths are returned unchanged.
#[must_use]
pub fn resolve_id(id: &str, base_url: &str) -> String {
    if id.starts_with('/') {
        format!("{}{id}", base_url.trim_end_matches('/'))
    } else {
        id.to_string()
    }
}

/// Builder for a delegated capability.
///
/// ```
/// use vcvault_capabilities::{Capability, DelegationBuilder, InvocationTarget, ResourceKind};
/// use vcvault_crypto::{DidKey, KeyPair};
///
/// let vault_key = KeyPair::generate();
/// let vault_did = DidKey::from_public_key(&vault_key.export_public_key());
/// let root = Capability {
///     context: None,
///     id: "/kms/keystores/ks1".into(),
///     parent: String::new(),
///     controller: Some(vault_did.did()),
///     invoker: String::new(),
///     invocation_target: InvocationTarget {
///         id: "/kms/keystores/ks1".into(),
///         target_type: "urn:kms:keystore".into(),
///     },
///     allowed_actions: Vec::new(),
///     caveats: Vec::new(),
///     capability_chain: Vec::new(),
///     proof: None,
/// };
///
/// let child = DelegationBuilder::new(&root, ResourceKind::KeyStore)
///     .invoker("did:key:z6MkInvoker#z6MkInvoker")
///     .base_url("https://kms.example.com")
///     .sign(&vault_key, &vault_did.verification_method())
///     .unwrap();
///
/// assert_eq!(child.allowed_actions, vec!["unwrap"]);
/// assert_eq!(child.parent, "https://kms.example.com/kms/keystores/ks1");
/// assert!(child.verify_delegation().is_ok());
/// ```
#[derive(Debug)]
pub struct DelegationBuilder<'a> {
    parent: &'a Capability,
    kind: ResourceKind,
    invoker: Option<String>,
    actions: Vec<String>,
    caveats: Vec<Caveat>,
    base_url: Option<String>,
}

impl<'a> DelegationBuilder<'a> {
    /// Start a delegation from `parent`.
    #[must_use]
    pub fn new(parent: &'a Capability, kind: ResourceKind) -> Self {
        Self {
            parent,
            kind,
            invoker: None,
            actions: Vec::new(),
            caveats: Vec::new(),
            base_url: None,
        }
    }

    /// The DID URL of the party receiving the capability.
    #[must_use]
    pub fn invoker(mut self, invoker: impl Into<String>) -> Self {
        self.invoker = Some(invoker.into());
        self
    }

    /// Requested actions (ignored for key stores).
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = String>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Caveats copied onto the child.
    #[must_use]
    pub fn caveats(mut self, caveats: impl IntoIterator<Item = Caveat>) -> Self {
        self.caveats.extend(caveats);
        self
    }

    /// Base URL against which relative parent and target ids are resolved.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Build the child capability and sign it with the parent controller's key.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidDelegation`] if no invoker was set,
    /// any error from [`ResourceKind::delegated_actions`], or a serialization
    /// error while signing.
    pub fn sign(self, signer: &KeyPair, verification_method: &str) -> CapabilityResult<Capability> {
        let invoker = self
            .invoker
            .filter(|i| !i.is_empty())
            .ok_or_else(|| CapabilityError::InvalidDelegation("invoker is required".into()))?;
        let allowed_actions = self.kind.delegated_actions(self.parent, &self.actions)?;

        let resolve = |id: &str| match self.base_url.as_deref() {
            Some(base) => resolve_id(id, base),
            None => id.to_string(),
        };
        let parent_id = resolve(&self.parent.id);

        let mut capability_chain = self
            .parent
            .capability_chain
            .iter()
            .map(|id| resolve(id))
            .collect::<Vec<_>>();
        capability_chain.push(parent_id.clone());

        let mut child = Capability {
            context: Some(serde_json::Value::String(SECURITY_CONTEXT.to_string())),
            id: format!("urn:uuid:{}", Uuid::new_v4()),
            parent: parent_id,
            controller: None,
            invoker,
            invocation_target: InvocationTarget {
                id: resolve(&self.parent.invocation_target.id),
                target_type: self.parent.invocation_target.target_type.clone(),
            },
            allowed_actions,
            caveats: self.caveats,
            capability_chain,
            proof: None,
        };
        child.sign(signer, verification_method)?;
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcvault_crypto::DidKey;

    const INVOKER: &str = "did:key:z6MkInvoker#z6MkInvoker";

    fn root(id: &str, actions: &[&str]) -> Capability {
        Capability {
            context: None,
            id: id.into(),
            parent: String::new(),
            controller: Some("did:key:z6MkRoot".into()),
            invoker: String::new(),
            invocation_target: InvocationTarget {
                id: id.into(),
                target_type: "urn:edv:vault".into(),
            },
            allowed_actions: actions.iter().map(ToString::to_string).collect(),
            caveats: Vec::new(),
            capability_chain: Vec::new(),
            proof: None,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_keystore_always_unwrap() {
        let parent = root("/kms/keystores/ks1", &[]);
        let actions = ResourceKind::KeyStore
            .delegated_actions(&parent, &strings(&["read", "write"]))
            .unwrap();
        assert_eq!(actions, vec!["unwrap"]);

        let none = ResourceKind::KeyStore.delegated_actions(&parent, &[]).unwrap();
        assert_eq!(none, vec!["unwrap"]);
    }

    #[test]
    fn test_vault_uses_requested_actions() {
        let parent = root("https://edv/v1", &[]);
        let actions = ResourceKind::Vault
            .delegated_actions(&parent, &strings(&["write", "read"]))
            .unwrap();
        assert_eq!(actions, vec!["write", "read"]);
    }

    #[test]
    fn test_vault_rejects_repeated_action() {
        let parent = root("https://edv/v1", &[]);
        let err = ResourceKind::Vault
            .delegated_actions(&parent, &strings(&["read", "write", "read"]))
            .unwrap_err();
        assert!(matches!(
            err,
            CapabilityError::InvalidDelegation(ref msg) if msg.contains("read")
        ));
    }

    #[test]
    fn test_vault_rejects_empty_actions() {
        let parent = root("https://edv/v1", &[]);
        assert!(matches!(
            ResourceKind::Vault.delegated_actions(&parent, &[]),
            Err(CapabilityError::InvalidDelegation(_))
        ));
    }

    #[test]
    fn test_vault_rejects_broadening() {
        let parent = root("https://edv/v1", &["read"]);
        let err = ResourceKind::Vault
            .delegated_actions(&parent, &strings(&["read", "write"]))
            .unwrap_err();
        assert!(matches!(
            err,
            CapabilityError::ActionNotAllowed { ref action, .. } if action == "write"
        ));
    }

    #[test]
    fn test_resolve_id() {
        assert_eq!(
            resolve_id("/kms/keystores/ks1", "https://kms.example.com/"),
            "https://kms.example.com/kms/keystores/ks1"
        );
        assert_eq!(
            resolve_id("https://other/kms/keystores/ks1", "https://kms.example.com"),
            "https://other/kms/keystores/ks1"
        );
        assert_eq!(resolve_id("urn:uuid:1", "https://kms"), "urn:uuid:1");
    }

    #[test]
    fn test_child_shape() {
        let key = KeyPair::generate();
        let did = DidKey::from_public_key(&key.export_public_key());

        let mut parent = root("https://edv/v1", &[]);
        parent.capability_chain = vec!["https://edv/root".into()];

        let child = DelegationBuilder::new(&parent, ResourceKind::Vault)
            .invoker(INVOKER)
            .actions(strings(&["read"]))
            .caveats(vec![Caveat {
                caveat_type: "zcap-expiry".into(),
                duration: 60,
            }])
            .sign(&key, &did.verification_method())
            .unwrap();

        assert!(child.id.starts_with("urn:uuid:"));
        assert_eq!(child.parent, parent.id);
        assert_eq!(child.invoker, INVOKER);
        assert_eq!(child.invocation_target, parent.invocation_target);
        assert_eq!(child.allowed_actions, vec!["read"]);
        assert_eq!(child.caveats.len(), 1);
        assert_eq!(
            child.capability_chain,
            vec!["https://edv/root".to_string(), "https://edv/v1".to_string()]
        );
        assert_eq!(
            child.capability_chain.len(),
            parent.capability_chain.len().saturating_add(1)
        );
        assert_eq!(child.verify_delegation().unwrap(), did);
    }

    #[test]
    fn test_keystore_ids_resolved_against_base() {
        let key = KeyPair::generate();
        let parent = root("/kms/keystores/ks1", &[]);

        let child = DelegationBuilder::new(&parent, ResourceKind::KeyStore)
            .invoker(INVOKER)
            .base_url("https://kms.example.com")
            .sign(&key, "did:key:z6MkRoot#z6MkRoot")
            .unwrap();

        assert_eq!(child.parent, "https://kms.example.com/kms/keystores/ks1");
        assert_eq!(
            child.invocation_target.id,
            "https://kms.example.com/kms/keystores/ks1"
        );
        assert_eq!(
            child.capability_chain,
            vec!["https://kms.example.com/kms/keystores/ks1".to_string()]
        );
    }

    #[test]
    fn test_each_delegation_gets_new_id() {
        let key = KeyPair::generate();
        let parent = root("https://edv/v1", &[]);
        let build = || {
            DelegationBuilder::new(&parent, ResourceKind::Vault)
                .invoker(INVOKER)
                .actions(strings(&["read"]))
                .sign(&key, "did:key:z6MkRoot#z6MkRoot")
                .unwrap()
        };
        assert_ne!(build().id, build().id);
    }

    #[test]
    fn test_missing_invoker() {
        let key = KeyPair::generate();
        let parent = root("https://edv/v1", &[]);
        let result = DelegationBuilder::new(&parent, ResourceKind::Vault)
            .actions(strings(&["read"]))
            .sign(&key, "did:key:z6MkRoot#z6MkRoot");
        assert!(matches!(result, Err(CapabilityError::InvalidDelegation(_))));
    }
}
