/// Adaptive bitrate selection
///
/// `AdaptiveSelector` is a pure function of the ladder and a bandwidth sample.
/// `HysteresisSelector` wraps it per playback session: downgrades apply on the
/// first unfavourable sample, upgrades only after a streak of favourable ones.
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::constants::{SAFETY_FACTOR_DEN, SAFETY_FACTOR_NUM};
use crate::error::{DeliveryError, Result};
use crate::ladder::QualityLadder;
use crate::models::Rendition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbrReason {
    /// No previous quality for this session
    Initial,
    UpSwitch,
    DownSwitch,
    /// Current quality kept
    Hold,
    /// Nothing passes the safety factor; lowest rendition returned
    Floor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityDecision {
    pub rendition: Rendition,
    pub reason: AbrReason,
    pub changed: bool,
}

/// Whether `bandwidth_kbps` can carry `bitrate_kbps` with the safety margin.
/// Compared in `u128` so every `u64` bandwidth is valid input.
pub fn fits_bandwidth(bitrate_kbps: u32, bandwidth_kbps: u64) -> bool {
    u128::from(bitrate_kbps) * u128::from(SAFETY_FACTOR_NUM)
        <= u128::from(bandwidth_kbps) * u128::from(SAFETY_FACTOR_DEN)
}

/// Stateless rendition selector over a shared ladder
#[derive(Debug, Clone)]
pub struct AdaptiveSelector {
    ladder: Arc<QualityLadder>,
}

impl AdaptiveSelector {
    pub fn new(ladder: Arc<QualityLadder>) -> Self {
        Self { ladder }
    }

    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    /// Highest rendition whose bitrate × 1.5 fits the bandwidth, or the lowest
    /// rendition when none does.
    pub fn select(&self, bandwidth_kbps: u64) -> Result<&Rendition> {
        self.select_index(bandwidth_kbps)
            .map(|index| &self.ladder.renditions()[index])
    }

    /// Select a rendition and classify the move relative to `current`.
    pub fn select_quality(
        &self,
        bandwidth_kbps: u64,
        current: Option<&str>,
    ) -> Result<QualityDecision> {
        let index = self.select_index(bandwidth_kbps)?;
        let target = &self.ladder.renditions()[index];
        let floor = !fits_bandwidth(target.bitrate_kbps, bandwidth_kbps);

        let current_index = current.and_then(|name| self.ladder.position(name));
        let (reason, changed) = match current_index {
            None => (if floor { AbrReason::Floor } else { AbrReason::Initial }, true),
            Some(cur) if index < cur => (AbrReason::UpSwitch, true),
            Some(cur) if index > cur => (
                if floor { AbrReason::Floor } else { AbrReason::DownSwitch },
                true,
            ),
            Some(_) => (if floor { AbrReason::Floor } else { AbrReason::Hold }, false),
        };

        debug!(
            "ABR select: bandwidth_kbps={}, current={:?}, target={}, reason={:?}",
            bandwidth_kbps, current, target.name, reason
        );

        Ok(QualityDecision {
            rendition: target.clone(),
            reason,
            changed,
        })
    }

    /// Ladder index of the selected rendition (0 = highest)
    pub(crate) fn select_index(&self, bandwidth_kbps: u64) -> Result<usize> {
        let renditions = self.ladder.renditions();
        if renditions.is_empty() {
            error!("ABR select called on an empty quality ladder");
            return Err(DeliveryError::NoRenditionsAvailable);
        }

        Ok(renditions
            .iter()
            .position(|r| fits_bandwidth(r.bitrate_kbps, bandwidth_kbps))
            .unwrap_or(renditions.len() - 1))
    }
}

/// Per-session selector that damps quality oscillation.
///
/// Not shared between sessions; each player owns one.
#[derive(Debug, Clone)]
pub struct HysteresisSelector {
    selector: AdaptiveSelector,
    upgrade_samples: u32,
    current: Option<usize>,
    favourable_streak: u32,
}

impl HysteresisSelector {
    pub fn new(selector: AdaptiveSelector, upgrade_samples: u32) -> Self {
        Self {
            selector,
            upgrade_samples: upgrade_samples.max(1),
            current: None,
            favourable_streak: 0,
        }
    }

    pub fn current(&self) -> Option<&Rendition> {
        self.current
            .and_then(|index| self.selector.ladder().renditions().get(index))
    }

    /// Pin the session to a named rendition (manual quality pick).
    /// Returns false when the ladder has no such rendition.
    pub fn force(&mut self, name: &str) -> bool {
        match self.selector.ladder().position(name) {
            Some(index) => {
                self.current = Some(index);
                self.favourable_streak = 0;
                true
            }
            None => false,
        }
    }

    /// Feed one bandwidth sample and get the quality to play next.
    pub fn observe(&mut self, bandwidth_kbps: u64) -> Result<QualityDecision> {
        let target = self.selector.select_index(bandwidth_kbps)?;
        let renditions = self.selector.ladder().renditions();
        let floor = !fits_bandwidth(renditions[target].bitrate_kbps, bandwidth_kbps);

        let (index, reason, changed) = match self.current {
            None => {
                self.favourable_streak = 0;
                let reason = if floor { AbrReason::Floor } else { AbrReason::Initial };
                (target, reason, true)
            }
            Some(cur) if target > cur => {
                // Lower quality: apply at once
                self.favourable_streak = 0;
                let reason = if floor { AbrReason::Floor } else { AbrReason::DownSwitch };
                (target, reason, true)
            }
            Some(cur) if target < cur => {
                self.favourable_streak += 1;
                if self.favourable_streak >= self.upgrade_samples {
                    self.favourable_streak = 0;
                    (target, AbrReason::UpSwitch, true)
                } else {
                    debug!(
                        "ABR upgrade deferred: streak={}/{}",
                        self.favourable_streak, self.upgrade_samples
                    );
                    (cur, AbrReason::Hold, false)
                }
            }
            Some(cur) => {
                self.favourable_streak = 0;
                let reason = if floor { AbrReason::Floor } else { AbrReason::Hold };
                (cur, reason, false)
            }
        };

        self.current = Some(index);

        Ok(QualityDecision {
            rendition: renditions[index].clone(),
            reason,
            changed,
        })
    }
}
