use std::collections::HashMap;

use crate::detectors::thresholds::*;
use crate::models::anomaly::{AnomalyDetails, AnomalyDetected, AnomalyType};
use crate::models::market::MarketSnapshot;

/// Flags markets whose 24h volume jumps well above their running baseline.
///
/// The baseline is an EWMA per market. Detection is lazy: each snapshot is
/// compared against the pre-update average first, then folded in — a single
/// entry point keeps callers from reordering the two steps.
pub struct VolumeSpikeDetector {
    averages: HashMap<String, f64>,
}

impl VolumeSpikeDetector {
    pub fn new() -> Self {
        Self {
            averages: HashMap::new(),
        }
    }

    pub fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Option<AnomalyDetected> {
        let volume = snapshot.volume_24h;

        let anomaly = match self.averages.get(&snapshot.market_id) {
            Some(&avg) if avg > 0.0 => {
                let multiplier = volume / avg;
                if multiplier >= VOLUME_SPIKE_MULTIPLIER {
                    Some(AnomalyDetected::new(
                        AnomalyType::VolumeSpike,
                        snapshot.market_id.clone(),
                        format!(
                            "24h volume ${volume:.0} is {multiplier:.1}x the ${avg:.0} baseline"
                        ),
                        multiplier / VOLUME_SEVERITY_SCALE,
                        AnomalyDetails::VolumeSpike {
                            volume,
                            average_volume: avg,
                            multiplier,
                        },
                        snapshot.timestamp,
                    ))
                } else {
                    None
                }
            }
            _ => None,
        };

        self.averages
            .entry(snapshot.market_id.clone())
            .and_modify(|avg| {
                *avg = (1.0 - VOLUME_EWMA_ALPHA) * *avg + VOLUME_EWMA_ALPHA * volume
            })
            .or_insert(volume);

        anomaly
    }
}

impl Default for VolumeSpikeDetector {
    fn default() -> Self {
        Self::new()
    }
}
