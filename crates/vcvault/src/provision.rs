//! Vault provisioning.

use tracing::{debug, info};
use vcvault_capabilities::compress;
use vcvault_remote::DataVaultConfiguration;
use vcvault_remote::edv::vault_uri;

use crate::client::VaultClient;
use crate::error::{VaultResult, VaultResultExt};
use crate::identity::derive_identity;
use crate::model::{Authorization, CreatedVault, Location, VaultInfo};

impl VaultClient {
    /// Create a new vault: a fresh `did:key` identity, a KMS key store and an
    /// EDV data vault, both controlled by that identity.
    ///
    /// Every call produces a new, unrelated vault. Nothing is rolled back if a
    /// later stage fails; remote resources created by earlier stages are left
    /// behind.
    ///
    /// # Errors
    ///
    /// Returns the failing stage's error wrapped with its name:
    /// `create DID key`, `create key store`, `create data vault` or
    /// `save vault info`.
    #[tracing::instrument(skip_all)]
    pub async fn create_vault(&self) -> VaultResult<CreatedVault> {
        let identity = derive_identity(self.keys.as_ref())
            .await
            .context("create DID key")?;
        let controller = self
            .controller(&identity.key_id)
            .await
            .context("create DID key")?;
        debug!(vault_id = %identity.did, "derived vault identity");

        let key_store = self
            .kms
            .create_key_store(&controller)
            .await
            .context("create key store")?;
        debug!(vault_id = %identity.did, key_store = %key_store.url, "created key store");

        let data_vault = self
            .edv
            .create_data_vault(&controller, &DataVaultConfiguration::new(&identity.did))
            .await
            .context("create data vault")?;
        let edv = Location {
            uri: vault_uri(&data_vault.location).context("create data vault")?,
            auth_token: compress(&data_vault.capability).context("create data vault")?,
        };
        debug!(vault_id = %identity.did, data_vault = %edv.uri, "created data vault");

        let authorization = Authorization {
            edv,
            kms: Location {
                uri: key_store.url,
                auth_token: key_store.capability,
            },
        };
        let info = VaultInfo {
            signing_key_id: identity.key_id,
            authorization: authorization.clone(),
        };
        self.store
            .save_vault_info(&identity.did, &info)
            .await
            .context("save vault info")?;

        info!(vault_id = %identity.did, "vault created");
        Ok(CreatedVault {
            id: identity.did,
            authorization,
        })
    }
}
