//! Crash point generation.
//!
//! A crash point is drawn by inverse-distribution sampling so that the chance
//! of the multiplier surviving past any `m >= 1` is `rtp / m`. A player who
//! always cashes out at `m` therefore gets back `rtp` of their stakes over
//! many rounds.

use super::multiplier::{Chips, Multiplier};
use rand::Rng;
use serde::Serialize;

/// Source of crash points for new sessions.
///
/// The registry draws from this seam so that tests can pin crash points.
pub trait CrashSource: Send + Sync {
    /// Produce the crash point of the next round, already clamped to the cap.
    fn next_crash_point(&self) -> Multiplier;
}

/// RTP-calibrated crash point sampler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrashPointSampler {
    rtp: f64,
    cap: Multiplier,
}

impl CrashPointSampler {
    /// Create a sampler. `rtp` must lie in (0, 1); the engine configuration
    /// validates this before a sampler is ever built.
    pub fn new(rtp: f64, cap: Multiplier) -> Self {
        Self { rtp, cap }
    }

    pub fn rtp(&self) -> f64 {
        self.rtp
    }

    pub fn cap(&self) -> Multiplier {
        self.cap
    }

    /// Map a uniform draw `r` in [0, 1) to a crash point in [1.0, cap].
    ///
    /// The numerator is `rtp`, not `1 - rtp`, so that cashing out at any fixed
    /// target returns `rtp` of the stake on average.
    pub fn sample_from(&self, r: f64) -> Multiplier {
        let raw = self.rtp / (1.0 - r);
        Multiplier::from_f64(raw).min(self.cap)
    }

    /// Draw a crash point from `rng`.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Multiplier {
        self.sample_from(rng.random::<f64>())
    }
}

impl CrashSource for CrashPointSampler {
    fn next_crash_point(&self) -> Multiplier {
        self.sample(&mut rand::rng())
    }
}

/// Always returns the same crash point.
#[derive(Clone, Copy, Debug)]
pub struct FixedCrashPoint(pub Multiplier);

impl CrashSource for FixedCrashPoint {
    fn next_crash_point(&self) -> Multiplier {
        self.0
    }
}

/// Result of an offline fixed-target simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RtpReport {
    /// Rounds counted towards the ratio
    pub rounds: u64,
    /// Rounds skipped because the crash point was clamped to the cap
    pub capped: u64,
    /// Rounds in which the target was reached
    pub wins: u64,
    pub total_staked: Chips,
    pub total_paid: Chips,
}

impl RtpReport {
    /// Empirical payout ratio (`total_paid / total_staked`).
    pub fn ratio(&self) -> f64 {
        if self.total_staked == 0 {
            return 0.0;
        }
        self.total_paid as f64 / self.total_staked as f64
    }
}

/// Simulate `rounds` rounds of a player staking `stake` and cashing out at
/// `target`, in the continuous idealization (no tick granularity).
///
/// Rounds whose crash point hit the cap are excluded from the totals.
pub fn simulate_fixed_cashout<R: Rng>(
    sampler: &CrashPointSampler,
    target: Multiplier,
    stake: Chips,
    rounds: u64,
    rng: &mut R,
) -> RtpReport {
    let payout = target.apply(stake).unwrap_or(Chips::MAX);
    let mut report = RtpReport::default();

    for _ in 0..rounds {
        let crash_point = sampler.sample(rng);
        if crash_point >= sampler.cap() {
            report.capped += 1;
            continue;
        }

        report.rounds += 1;
        report.total_staked = report.total_staked.saturating_add(stake);
        if crash_point > target {
            report.wins += 1;
            report.total_paid = report.total_paid.saturating_add(payout);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn sampler() -> CrashPointSampler {
        CrashPointSampler::new(0.75, Multiplier::from_f64(10_000.0))
    }

    #[test]
    fn test_sample_from_zero_clamps_to_one() {
        // 0.75 / 1.0 is below 1.0x, so the rocket explodes immediately
        assert_eq!(sampler().sample_from(0.0), Multiplier::ONE);
    }

    #[test]
    fn test_sample_from_midpoint() {
        // 0.75 / 0.25 = 3.0x
        assert_eq!(sampler().sample_from(0.75), Multiplier::from_units(30_000));
    }

    #[test]
    fn test_sample_near_one_hits_cap() {
        let s = sampler();
        assert_eq!(s.sample_from(1.0 - 1e-12), s.cap());
        assert_eq!(s.sample_from(0.999_999_9), s.cap());
    }

    #[test]
    fn test_samples_stay_in_range() {
        let s = CrashPointSampler::new(0.97, Multiplier::from_f64(50.0));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let crash_point = s.sample(&mut rng);
            assert!(crash_point >= Multiplier::ONE);
            assert!(crash_point <= s.cap());
        }
    }

    #[test]
    fn test_survival_probability_matches_rtp() {
        let s = sampler();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 200_000;
        let survived = (0..n)
            .filter(|_| s.sample(&mut rng) > Multiplier::from_units(30_000))
            .count();
        // P(crash > 3.0) = 0.75 / 3.0 = 0.25
        let p = survived as f64 / n as f64;
        assert!((p - 0.25).abs() < 0.01, "survival probability {p}");
    }

    #[test]
    fn test_fixed_crash_point_source() {
        let source = FixedCrashPoint(Multiplier::from_units(34_700));
        assert_eq!(source.next_crash_point(), Multiplier::from_units(34_700));
        assert_eq!(source.next_crash_point(), Multiplier::from_units(34_700));
    }

    #[test]
    fn test_report_ratio_empty() {
        assert_eq!(RtpReport::default().ratio(), 0.0);
    }
}
