use anyhow::{Context, Result};
use redb::ReadableTable;
use tracing::debug;

use super::crypto;
use super::db::OPTIONS;
use super::model::{Configuration, OptionKey};

impl super::db::Store {
    /// Read all four configuration keys. Missing or unparsable values fall
    /// back to the field default.
    pub fn load_configuration(&self) -> Result<Configuration> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OPTIONS)?;

        let get = |key: OptionKey| -> Result<Option<String>> {
            Ok(table.get(key.as_str())?.map(|v| v.value().to_owned()))
        };

        let template_resource_id = get(OptionKey::TemplatePostId)?
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|id| *id != 0);
        let activated = get(OptionKey::PluginActivated)?
            .map(|v| v.trim() == "1")
            .unwrap_or(false);
        let schema_version = get(OptionKey::DatabaseVersion)?
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let shared_secret = match get(OptionKey::PluginKey)? {
            Some(sealed) => Some(crypto::open(&self.key, &sealed).context("unseal plugin_key")?),
            None => None,
        };

        Ok(Configuration {
            template_resource_id,
            activated,
            shared_secret,
            schema_version,
        })
    }

    pub fn has_option(&self, key: OptionKey) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OPTIONS)?;
        let present = table.get(key.as_str())?.is_some();
        Ok(present)
    }

    pub fn set_template_id(&self, id: u64) -> Result<()> {
        self.put_option(OptionKey::TemplatePostId, &id.to_string())
    }

    pub fn set_activated(&self, activated: bool) -> Result<()> {
        self.put_option(OptionKey::PluginActivated, if activated { "1" } else { "0" })
    }

    pub fn set_schema_version(&self, version: u32) -> Result<()> {
        self.put_option(OptionKey::DatabaseVersion, &version.to_string())
    }

    /// Persist the shared secret, sealed under the store's master key.
    pub fn set_shared_secret(&self, secret: &str) -> Result<()> {
        let sealed = crypto::seal(&self.key, secret)?;
        self.put_option(OptionKey::PluginKey, &sealed)
    }

    /// Reset one field to its default by removing its key.
    pub fn reset_option(&self, key: OptionKey) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(OPTIONS)?;
            let existed = table.remove(key.as_str())?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Remove every configuration key in one transaction.
    pub fn clear_configuration(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OPTIONS)?;
            for key in OptionKey::ALL {
                if table.remove(key.as_str())?.is_none() {
                    debug!(key = key.as_str(), "configuration key already absent");
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn put_option(&self, key: OptionKey, value: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OPTIONS)?;
            table.insert(key.as_str(), value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
