//! Shortlist and deep-dive sizing from preference, pool size, and remaining time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sift_config::{CapProfile, Caps};
use sift_domain::Preference;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineCaps {
	pub shortlist: usize,
	pub deep_dive: usize,
	/// 1.0 means no time pressure.
	pub pressure_factor: f32,
}

pub fn profile(cfg: &Caps, preference: Preference) -> &CapProfile {
	match preference {
		Preference::Precision => &cfg.precision,
		Preference::Recall => &cfg.recall,
	}
}

pub fn pressure_factor(cfg: &Caps, remaining: Duration) -> f32 {
	if cfg.comfortable_ms == 0 {
		return 1.0;
	}

	let ratio = remaining.as_millis() as f32 / cfg.comfortable_ms as f32;

	ratio.clamp(cfg.min_pressure_factor.min(1.0), 1.0)
}

/// Caps always satisfy `deep_dive <= shortlist <= pool_size`.
pub fn compute(
	cfg: &Caps,
	preference: Preference,
	pool_size: usize,
	remaining: Duration,
) -> PipelineCaps {
	let pressure = pressure_factor(cfg, remaining);

	if pool_size == 0 {
		return PipelineCaps { shortlist: 0, deep_dive: 0, pressure_factor: pressure };
	}

	let profile = profile(cfg, preference);
	let (shortlist_min, shortlist_max) =
		scaled_bounds(profile.shortlist_min, profile.shortlist_max, pressure);
	let shortlist = ((pool_size as f32 * profile.shortlist_fraction * pressure).ceil() as usize)
		.clamp(shortlist_min, shortlist_max)
		.min(pool_size);
	let (deep_min, deep_max) =
		scaled_bounds(profile.deep_dive_min, profile.deep_dive_max, pressure);
	let by_time = time_bound(cfg, remaining);
	let deep_dive = ((shortlist as f32 * profile.deep_dive_fraction).ceil() as usize)
		.clamp(deep_min, deep_max)
		.min(by_time)
		.min(shortlist);

	PipelineCaps { shortlist, deep_dive, pressure_factor: pressure }
}

fn scaled_bounds(min: u32, max: u32, pressure: f32) -> (usize, usize) {
	let min = ((min as f32 * pressure).round() as usize).max(1);
	let max = ((max as f32 * pressure).round() as usize).max(min);

	(min, max)
}

/// Items that fit after the synthesis reserve; at least one so a tight budget still yields a
/// result.
fn time_bound(cfg: &Caps, remaining: Duration) -> usize {
	if cfg.deep_dive_estimate_ms == 0 {
		return usize::MAX;
	}

	let usable = (remaining.as_millis() as u64).saturating_sub(cfg.synthesis_reserve_ms);

	((usable / cfg.deep_dive_estimate_ms) as usize).max(1)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn precision_pool_of_thirty_without_pressure() {
		let caps = compute(&Caps::default(), Preference::Precision, 30, Duration::from_secs(120));

		assert_eq!(caps.shortlist, 15);
		assert_eq!(caps.deep_dive, 9);
		assert_eq!(caps.pressure_factor, 1.0);
	}

	#[test]
	fn recall_is_larger_than_precision() {
		let cfg = Caps::default();
		let precision = compute(&cfg, Preference::Precision, 60, Duration::from_secs(120));
		let recall = compute(&cfg, Preference::Recall, 60, Duration::from_secs(120));

		assert!(recall.shortlist > precision.shortlist);
		assert!(recall.deep_dive >= precision.deep_dive);
	}

	#[test]
	fn caps_shrink_under_time_pressure() {
		let cfg = Caps::default();
		let relaxed = compute(&cfg, Preference::Recall, 80, Duration::from_secs(60));
		let pressed = compute(&cfg, Preference::Recall, 80, Duration::from_secs(9));

		assert!(pressed.pressure_factor < 1.0);
		assert!(pressed.shortlist < relaxed.shortlist);
		assert!(pressed.deep_dive < relaxed.deep_dive);
	}

	#[test]
	fn caps_never_exceed_pool() {
		let cfg = Caps::default();

		for pool in 0..50 {
			for preference in [Preference::Precision, Preference::Recall] {
				let caps = compute(&cfg, preference, pool, Duration::from_secs(40));

				assert!(caps.shortlist <= pool);
				assert!(caps.deep_dive <= caps.shortlist);
			}
		}
	}
}
