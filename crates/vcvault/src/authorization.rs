//! Delegating vault access to third parties.
//!
//! An authorization is a pair of capabilities delegated from the vault's own
//! root capabilities to a requesting party:
//!
//! - a KMS capability that only allows `unwrap`, so the party can decrypt
//!   documents but never manage keys
//! - an EDV capability that allows exactly the scope's actions
//!
//! Both are signed by the vault's key, with the vault DID URL as the proof's
//! verification method.

use tracing::info;
use uuid::Uuid;
use vcvault_capabilities::{
    CapabilityError, DelegationBuilder, ResourceKind, compress, decompress,
};

use crate::client::VaultClient;
use crate::error::{VaultError, VaultResult, VaultResultExt};
use crate::identity::to_did_url;
use crate::model::{CreatedAuthorization, Scope, Tokens};

/// Delegation requests the caller got wrong are validation failures; the
/// rest are capability failures.
fn delegation_error(err: CapabilityError) -> VaultError {
    match err {
        CapabilityError::ActionNotAllowed { .. } | CapabilityError::InvalidDelegation(_) => {
            VaultError::Validation(err.to_string())
        },
        other => VaultError::Capability(other),
    }
}

impl VaultClient {
    /// Grant `requesting_party` access to a vault.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the vault is unknown
    /// - [`VaultError::Validation`] if `requesting_party` is not a `did:key`,
    ///   no action is requested, or an action exceeds the vault's own
    ///   capability
    /// - [`VaultError::Capability`] if a stored capability cannot be read or
    ///   the new one cannot be signed
    #[tracing::instrument(skip(self, scope), fields(actions = ?scope.actions))]
    pub async fn create_authorization(
        &self,
        vault_id: &str,
        requesting_party: &str,
        scope: Scope,
    ) -> VaultResult<CreatedAuthorization> {
        let info = self
            .store
            .vault_info(vault_id)
            .await
            .context("get vault info")?;
        let signer = self
            .keys
            .signing_key(&info.signing_key_id)
            .await
            .context("get signing key")?;
        let verification_method = to_did_url(vault_id).context("vault id to DID URL")?;
        let invoker =
            to_did_url(requesting_party).context("requesting party to DID URL")?;

        let kms_parent =
            decompress(&info.authorization.kms.auth_token).context("decompress kms capability")?;
        let kms = DelegationBuilder::new(&kms_parent, ResourceKind::KeyStore)
            .invoker(invoker.as_str())
            .caveats(scope.caveats.iter().cloned())
            .base_url(self.kms.base_url().as_str())
            .sign(&signer, &verification_method)
            .map_err(delegation_error)
            .context("delegate kms capability")?;

        let edv_parent =
            decompress(&info.authorization.edv.auth_token).context("decompress edv capability")?;
        let edv = DelegationBuilder::new(&edv_parent, ResourceKind::Vault)
            .invoker(invoker)
            .actions(scope.actions.iter().cloned())
            .caveats(scope.caveats.iter().cloned())
            .sign(&signer, &verification_method)
            .map_err(delegation_error)
            .context("delegate edv capability")?;

        let authorization = CreatedAuthorization {
            id: Uuid::new_v4().to_string(),
            scope,
            requesting_party: requesting_party.to_string(),
            tokens: Tokens {
                edv: compress(&edv).context("compress edv capability")?,
                kms: compress(&kms).context("compress kms capability")?,
            },
        };
        self.store
            .save_authorization(vault_id, &authorization)
            .await
            .context("save authorization")?;

        info!(authorization_id = %authorization.id, "authorization created");
        Ok(authorization)
    }

    /// Look up an authorization created earlier.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`NotFound`](crate::ErrorKind::NotFound) if
    /// no such authorization exists for the vault.
    #[tracing::instrument(skip(self))]
    pub async fn get_authorization(
        &self,
        vault_id: &str,
        id: &str,
    ) -> VaultResult<CreatedAuthorization> {
        self.store
            .authorization(vault_id, id)
            .await
            .context("get authorization")
    }
}
