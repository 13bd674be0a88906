//! Long-run return-to-player checks.
//!
//! A player who always cashes out at the same multiplier should get back the
//! configured RTP of their stakes.

use rand::{SeedableRng, rngs::StdRng};
use rocket_crash::game::{
    CrashPointSampler, GameSession, Multiplier, RoundRules, Signal, TickStep, resolve,
    simulate_fixed_cashout,
};

const RTP: f64 = 0.75;

fn sampler() -> CrashPointSampler {
    CrashPointSampler::new(RTP, Multiplier::from_f64(10_000.0))
}

#[test]
fn test_fixed_cashout_converges_to_rtp() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let report = simulate_fixed_cashout(
        &sampler(),
        Multiplier::from_f64(2.0),
        100,
        1_000_000,
        &mut rng,
    );

    let ratio = report.ratio();
    assert!(
        (ratio - RTP).abs() <= RTP * 0.01,
        "ratio {ratio} outside 1% of {RTP} ({report:?})"
    );
    assert!(report.capped < 1_000);
    assert_eq!(report.rounds + report.capped, 1_000_000);
}

#[test]
fn test_rtp_holds_across_targets() {
    let mut rng = StdRng::seed_from_u64(17);
    for target in [1.5, 3.0, 5.0] {
        let report = simulate_fixed_cashout(
            &sampler(),
            Multiplier::from_f64(target),
            100,
            400_000,
            &mut rng,
        );
        let ratio = report.ratio();
        assert!(
            (ratio - RTP).abs() <= RTP * 0.03,
            "target {target}: ratio {ratio}"
        );
    }
}

/// Same strategy played through the tick state machine: the player reacts to
/// a published multiplier and the cash-out lands one step later.
#[test]
fn test_discrete_ticks_stay_close_to_rtp() {
    let sampler = sampler();
    let rules = RoundRules {
        step_units: 100,
        cap: sampler.cap(),
    };
    let target = Multiplier::from_f64(2.0);
    let stake = 100;
    let rounds = 200_000;
    let mut rng = StdRng::seed_from_u64(99);

    let mut staked = 0i64;
    let mut paid = 0i64;
    for _ in 0..rounds {
        let mut session = GameSession::new(1, stake, sampler.sample(&mut rng), rules);
        session.start().unwrap();

        let mut signal = None;
        let outcome = loop {
            match session.evaluate(signal.take()) {
                TickStep::Continue { multiplier, .. } => {
                    if multiplier >= target {
                        signal = Some(Signal::CashOut);
                    }
                    session.advance();
                }
                TickStep::Resolve(resolution) => break resolve(&mut session, resolution).unwrap(),
                TickStep::Idle => panic!("session stopped running"),
            }
        };

        staked += stake;
        paid += outcome.payout;
    }

    let ratio = paid as f64 / staked as f64;
    assert!(
        (ratio - RTP).abs() <= RTP * 0.02,
        "discrete ratio {ratio}"
    );
}
