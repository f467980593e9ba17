//! Read-only access to the fortune lots resource.
//!
//! The JSON file is read on every call so edits to it take effect without a
//! restart.

use crate::models::FortuneLot;
use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use service_core::error::AppError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LotStore {
    path: PathBuf,
}

impl LotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load every lot from the backing file.
    pub async fn load(&self) -> Result<Vec<FortuneLot>, AppError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read lots file {}", self.path.display()))?;

        let lots: Vec<FortuneLot> = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse lots file {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), count = lots.len(), "Loaded lots");
        Ok(lots)
    }

    /// Uniformly random lot.
    pub async fn draw_random(&self) -> Result<FortuneLot, AppError> {
        let lots = self.load().await?;
        pick_random(&lots, &mut rand::thread_rng())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<FortuneLot, AppError> {
        let lots = self.load().await?;
        find_by_id(&lots, id)
    }
}

pub fn pick_random<R: Rng + ?Sized>(
    lots: &[FortuneLot],
    rng: &mut R,
) -> Result<FortuneLot, AppError> {
    lots.choose(rng)
        .cloned()
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Lots file contains no lots")))
}

pub fn find_by_id(lots: &[FortuneLot], id: i64) -> Result<FortuneLot, AppError> {
    lots.iter()
        .find(|lot| lot.id == id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Lot not found")))
}
