//! Property tests: whatever sequence of operations runs, base amounts track the
//! wallet exactly and a second rebalance has nothing left to do.

mod common;

use common::*;
use pairvault_core::math::fixed_point::{mul_div, Rounding};
use pairvault_core::{AssetId, WAD};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Deposit(u64),
    Withdraw(u64),
    WithdrawAll,
    MoveTick(i32),
    /// Shift pool inventory toward A (bps of value kept in A)
    Skew(u32),
    /// Price of B in percent
    PriceB(u32),
    Reward(u64),
    Rebalance,
    Hardwork,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..1_000_000).prop_map(Op::Deposit),
        2 => (1u64..500_000).prop_map(Op::Withdraw),
        1 => Just(Op::WithdrawAll),
        2 => (-300i32..300).prop_map(Op::MoveTick),
        1 => (2_000u32..8_000).prop_map(Op::Skew),
        1 => (80u32..140).prop_map(Op::PriceB),
        1 => (1u64..10_000).prop_map(Op::Reward),
        2 => Just(Op::Rebalance),
        1 => Just(Op::Hardwork),
    ]
}

fn skew(market: &SimMarket, keep_a_bps: u32) {
    let mut state = market.state();
    let price_b = state.prices.get(&market.asset_b).copied().unwrap_or(WAD);
    let [a, b] = state.reserves;

    // Value-preserving at the current B price, A priced at 1
    let value = a + mul_div(b, price_b, WAD, Rounding::Down).unwrap();
    let new_a = value * u128::from(keep_a_bps) / 10_000;
    let new_b = mul_div(value - new_a, WAD, price_b, Rounding::Down).unwrap();
    state.reserves = [new_a, new_b];
}

fn apply(market: &SimMarket, strategy: &pairvault_rebalancer::PairStrategy, op: &Op) -> TestResult {
    let milli = UNIT / 1_000;
    match op {
        Op::Deposit(amount) => {
            let amount = u128::from(*amount) * milli;
            market.fund(&market.asset_a, amount);
            strategy.deposit(amount)?;
        }
        Op::Withdraw(amount) => {
            strategy.withdraw_amount(u128::from(*amount) * milli)?;
        }
        Op::WithdrawAll => {
            strategy.withdraw_all()?;
        }
        Op::MoveTick(tick) => market.set_tick(*tick),
        Op::Skew(bps) => skew(market, *bps),
        Op::PriceB(percent) => market.set_price(&AssetId::new("B"), u128::from(*percent) * WAD / 100),
        Op::Reward(amount) => {
            market.state().pool_rewards = vec![(market.asset_a.clone(), u128::from(*amount) * milli)];
        }
        Op::Rebalance => {
            strategy.rebalance()?;
        }
        Op::Hardwork => {
            strategy.hardwork()?;
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_ledger_tracks_wallet(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let (market, strategy) = setup().unwrap();

        for op in &ops {
            let result = apply(&market, &strategy, op);
            prop_assert!(result.is_ok(), "{:?} failed: {:?}", op, result);

            let state = strategy.state().unwrap();
            for asset in [&market.asset_a, &market.asset_b] {
                prop_assert_eq!(state.ledger.base_amount(asset), market.wallet(asset));
            }
            prop_assert!(!strategy.is_busy());
        }

        prop_assert!(strategy.reconcile().unwrap().is_clean());
    }

    #[test]
    fn prop_rebalance_settles_in_range(tick in -1_000i32..1_000, deposit in 1u64..1_000_000) {
        let (market, strategy) = setup().unwrap();
        fund_and_deposit(&market, &strategy, u128::from(deposit)).unwrap();

        market.set_tick(tick);
        strategy.rebalance().unwrap();
        prop_assert_eq!(strategy.phase(), pairvault_rebalancer::PositionPhase::InRange);

        // Nothing moved since: the next pass is a no-op
        let swaps = market.swaps();
        let again = strategy.rebalance().unwrap();
        prop_assert_eq!(again.plan_kind, None);
        prop_assert_eq!(market.swaps(), swaps);
    }
}
