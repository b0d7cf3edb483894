//! Randomize key persistence in AuxStore

use sc_client_api::AuxStore;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Fixed key the pending opening is stored under between commit and reveal
pub const RANDOMIZE_KEY_NAME: &[u8] = b"randomizeKey";

/// Holds the opening key of the secret committed this epoch
pub struct RandomizeKeyStore<C> {
    client: Arc<C>,
}

impl<C> RandomizeKeyStore<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

impl<C: AuxStore> RandomizeKeyStore<C> {
    pub fn has(&self) -> Result<bool> {
        self.client
            .get_aux(RANDOMIZE_KEY_NAME)
            .map(|value| value.is_some())
            .map_err(|e| Error::Store(format!("Failed to read randomize key: {:?}", e)))
    }

    pub fn get(&self) -> Result<Vec<u8>> {
        self.client
            .get_aux(RANDOMIZE_KEY_NAME)
            .map_err(|e| Error::Store(format!("Failed to read randomize key: {:?}", e)))?
            .ok_or(Error::RandomizeKeyMissing)
    }

    pub fn put(&self, value: &[u8]) -> Result<()> {
        self.client
            .insert_aux(&[(RANDOMIZE_KEY_NAME, value)], &[])
            .map_err(|e| Error::Store(format!("Failed to store randomize key: {:?}", e)))
    }

    pub fn delete(&self) -> Result<()> {
        self.client
            .insert_aux(&[], &[RANDOMIZE_KEY_NAME])
            .map_err(|e| Error::Store(format!("Failed to delete randomize key: {:?}", e)))
    }
}

impl<C> Clone for RandomizeKeyStore<C> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone() }
    }
}
