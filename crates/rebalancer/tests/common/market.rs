//! In-memory market standing in for every collaborator.
//!
//! One wallet (the strategy's custody), one vault, a pool that takes whatever it
//! is given and mints liquidity by A value, a lending market releasing collateral
//! pro rata, and a router that fills at oracle prices scaled by `fill_bps`.
//!
//! Nothing rolls back: like real external systems, calls that completed before
//! a failure stay completed.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use pairvault_core::math::fixed_point::{mul_div, Rounding};
use pairvault_core::{AssetId, TickRange, WAD};
use pairvault_rebalancer::{
    Collaborators, Custody, EngineResult, LendingAdapter, Pool, PoolEntry, PriceOracle, RebalancerError, RepayOutcome,
    SwapRouter,
};

pub const RANGE_HALF_WIDTH: i32 = 100;

type SwapHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
pub struct MarketState {
    pub wallet: BTreeMap<AssetId, u128>,
    pub vault: BTreeMap<AssetId, u128>,
    pub prices: BTreeMap<AssetId, u128>,

    /// Pool inventory backing the strategy's liquidity, A first
    pub reserves: [u128; 2],
    pub liquidity: u128,
    pub tick: i32,
    pub range: TickRange,
    pub tick_ratio: u128,

    pub debt: u128,
    pub collateral: u128,

    /// Basis points of the fair output the router delivers
    pub fill_bps: u128,
    pub swaps: usize,

    pub pool_rewards: Vec<(AssetId, u128)>,
    pub lending_rewards: Vec<(AssetId, u128)>,

    /// Collaborator whose next call fails
    pub fail_next: Option<&'static str>,
}

pub struct SimMarket {
    pub asset_a: AssetId,
    pub asset_b: AssetId,
    state: Mutex<MarketState>,
    on_swap: Mutex<Option<SwapHook>>,
}

impl SimMarket {
    pub fn new(asset_a: &str, asset_b: &str) -> Arc<Self> {
        let asset_a = AssetId::new(asset_a);
        let asset_b = AssetId::new(asset_b);

        let mut state = MarketState {
            range: TickRange::new(-RANGE_HALF_WIDTH, RANGE_HALF_WIDTH),
            tick_ratio: WAD / 2,
            fill_bps: 10_000,
            ..MarketState::default()
        };
        state.prices.insert(asset_a.clone(), WAD);
        state.prices.insert(asset_b.clone(), WAD);

        Arc::new(Self {
            asset_a,
            asset_b,
            state: Mutex::new(state),
            on_swap: Mutex::new(None),
        })
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            pool: self.clone(),
            lending: self.clone(),
            router: self.clone(),
            oracle: self.clone(),
            custody: self.clone(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MarketState> {
        self.state.lock().unwrap()
    }

    /// Vault transfer into the strategy's wallet ahead of a deposit
    pub fn fund(&self, asset: &AssetId, amount: u128) {
        *self.state().wallet.entry(asset.clone()).or_default() += amount;
    }

    pub fn wallet(&self, asset: &AssetId) -> u128 {
        self.state().wallet.get(asset).copied().unwrap_or(0)
    }

    pub fn vault(&self, asset: &AssetId) -> u128 {
        self.state().vault.get(asset).copied().unwrap_or(0)
    }

    pub fn set_price(&self, asset: &AssetId, price: u128) {
        self.state().prices.insert(asset.clone(), price);
    }

    pub fn set_tick(&self, tick: i32) {
        self.state().tick = tick;
    }

    /// Replace the pool inventory, as a price move inside the range would
    pub fn set_reserves(&self, reserves: [u128; 2]) {
        self.state().reserves = reserves;
    }

    pub fn fail_next(&self, collaborator: &'static str) {
        self.state().fail_next = Some(collaborator);
    }

    /// Run `hook` during every swap, outside the market lock
    pub fn on_swap(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_swap.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn swaps(&self) -> usize {
        self.state().swaps
    }

    /// Pre-flight for every collaborator call
    fn enter_call(&self, collaborator: &'static str) -> EngineResult<MutexGuard<'_, MarketState>> {
        let mut state = self.state();
        if state.fail_next == Some(collaborator) {
            state.fail_next = None;
            return Err(RebalancerError::external(collaborator, "injected failure"));
        }
        Ok(state)
    }

    fn value_in_a(state: &MarketState, asset_a: &AssetId, asset_b: &AssetId, amounts: [u128; 2]) -> EngineResult<u128> {
        let price_a = state.prices.get(asset_a).copied().unwrap_or(0);
        let price_b = state.prices.get(asset_b).copied().unwrap_or(0);
        if price_a == 0 {
            return Ok(amounts[0] + amounts[1]);
        }
        Ok(amounts[0] + mul_div(amounts[1], price_b, price_a, Rounding::Down)?)
    }

    fn exit_share(state: &MarketState, liquidity: u128) -> EngineResult<[u128; 2]> {
        if state.liquidity == 0 {
            return Ok([0, 0]);
        }
        if liquidity >= state.liquidity {
            return Ok(state.reserves);
        }
        Ok([
            mul_div(state.reserves[0], liquidity, state.liquidity, Rounding::Down)?,
            mul_div(state.reserves[1], liquidity, state.liquidity, Rounding::Down)?,
        ])
    }

    fn released_collateral(state: &MarketState, amount: u128) -> EngineResult<u128> {
        if state.debt == 0 {
            return Ok(0);
        }
        if amount >= state.debt {
            return Ok(state.collateral);
        }
        Ok(mul_div(state.collateral, amount, state.debt, Rounding::Down)?)
    }
}

fn debit(wallet: &mut BTreeMap<AssetId, u128>, asset: &AssetId, amount: u128) -> EngineResult<()> {
    let balance = wallet.entry(asset.clone()).or_default();
    if *balance < amount {
        return Err(RebalancerError::external("custody", format!("insufficient {}", asset)));
    }
    *balance -= amount;
    Ok(())
}

fn credit(wallet: &mut BTreeMap<AssetId, u128>, asset: &AssetId, amount: u128) {
    *wallet.entry(asset.clone()).or_default() += amount;
}

impl Pool for SimMarket {
    fn enter(&self, amounts_desired: [u128; 2]) -> EngineResult<PoolEntry> {
        let mut state = self.enter_call("pool")?;
        let liquidity = Self::value_in_a(&state, &self.asset_a, &self.asset_b, amounts_desired)?;

        debit(&mut state.wallet, &self.asset_a, amounts_desired[0])?;
        debit(&mut state.wallet, &self.asset_b, amounts_desired[1])?;
        state.reserves[0] += amounts_desired[0];
        state.reserves[1] += amounts_desired[1];
        state.liquidity += liquidity;

        Ok(PoolEntry {
            consumed: amounts_desired,
            liquidity,
        })
    }

    fn exit(&self, liquidity: u128, _emergency: bool) -> EngineResult<[u128; 2]> {
        let mut state = self.enter_call("pool")?;
        let out = Self::exit_share(&state, liquidity)?;

        state.reserves[0] -= out[0];
        state.reserves[1] -= out[1];
        state.liquidity = state.liquidity.saturating_sub(liquidity);
        credit(&mut state.wallet, &self.asset_a, out[0]);
        credit(&mut state.wallet, &self.asset_b, out[1]);
        Ok(out)
    }

    fn quote_exit(&self, liquidity: u128) -> EngineResult<[u128; 2]> {
        let state = self.enter_call("pool")?;
        Self::exit_share(&state, liquidity)
    }

    fn current_tick_ratio(&self) -> EngineResult<u128> {
        Ok(self.enter_call("pool")?.tick_ratio)
    }

    fn current_tick(&self) -> EngineResult<i32> {
        Ok(self.enter_call("pool")?.tick)
    }

    fn select_range(&self, current_tick: i32) -> EngineResult<TickRange> {
        let mut state = self.enter_call("pool")?;
        state.range = TickRange::new(current_tick - RANGE_HALF_WIDTH, current_tick + RANGE_HALF_WIDTH);
        Ok(state.range)
    }

    fn claim_rewards(&self) -> EngineResult<Vec<(AssetId, u128)>> {
        let mut state = self.enter_call("pool")?;
        let rewards = std::mem::take(&mut state.pool_rewards);
        for (asset, amount) in &rewards {
            credit(&mut state.wallet, asset, *amount);
        }
        Ok(rewards)
    }
}

impl LendingAdapter for SimMarket {
    fn borrow(
        &self,
        collateral_asset: &AssetId,
        collateral_amount: u128,
        borrow_asset: &AssetId,
        amount_to_borrow: u128,
    ) -> EngineResult<u128> {
        let mut state = self.enter_call("lending")?;
        debit(&mut state.wallet, collateral_asset, collateral_amount)?;
        credit(&mut state.wallet, borrow_asset, amount_to_borrow);
        state.collateral += collateral_amount;
        state.debt += amount_to_borrow;
        Ok(amount_to_borrow)
    }

    fn repay(&self, collateral_asset: &AssetId, borrow_asset: &AssetId, amount_repay: u128) -> EngineResult<RepayOutcome> {
        let mut state = self.enter_call("lending")?;
        let amount = amount_repay.min(state.debt);
        let released = Self::released_collateral(&state, amount)?;

        debit(&mut state.wallet, borrow_asset, amount)?;
        credit(&mut state.wallet, collateral_asset, released);
        state.debt -= amount;
        state.collateral -= released;

        Ok(RepayOutcome {
            collateral_returned: released,
            leftover_borrowed: amount_repay - amount,
        })
    }

    fn get_debt_amount_current(&self, _collateral_asset: &AssetId, _borrow_asset: &AssetId) -> EngineResult<(u128, u128)> {
        let state = self.enter_call("lending")?;
        Ok((state.debt, state.collateral))
    }

    fn quote_repay(&self, _collateral_asset: &AssetId, _borrow_asset: &AssetId, amount_repay: u128) -> EngineResult<u128> {
        let state = self.enter_call("lending")?;
        Self::released_collateral(&state, amount_repay)
    }

    fn claim_rewards(&self) -> EngineResult<Vec<(AssetId, u128)>> {
        let mut state = self.enter_call("lending")?;
        let rewards = std::mem::take(&mut state.lending_rewards);
        for (asset, amount) in &rewards {
            credit(&mut state.wallet, asset, *amount);
        }
        Ok(rewards)
    }
}

impl SwapRouter for SimMarket {
    fn swap(&self, asset_in: &AssetId, asset_out: &AssetId, amount_in: u128) -> EngineResult<u128> {
        let hook = self.on_swap.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }

        let mut state = self.enter_call("router")?;
        let price_in = state.prices.get(asset_in).copied().unwrap_or(0);
        let price_out = state.prices.get(asset_out).copied().unwrap_or(0);
        if price_out == 0 {
            return Err(RebalancerError::external("router", "no route"));
        }

        let fair = mul_div(amount_in, price_in, price_out, Rounding::Down)?;
        let out = mul_div(fair, state.fill_bps, 10_000, Rounding::Down)?;

        debit(&mut state.wallet, asset_in, amount_in)?;
        credit(&mut state.wallet, asset_out, out);
        state.swaps += 1;
        Ok(out)
    }
}

impl PriceOracle for SimMarket {
    fn price(&self, asset: &AssetId) -> EngineResult<u128> {
        let state = self.enter_call("oracle")?;
        Ok(state.prices.get(asset).copied().unwrap_or(0))
    }
}

impl Custody for SimMarket {
    fn balance_of(&self, asset: &AssetId) -> EngineResult<u128> {
        let state = self.enter_call("custody")?;
        Ok(state.wallet.get(asset).copied().unwrap_or(0))
    }

    fn send_to_vault(&self, asset: &AssetId, amount: u128) -> EngineResult<()> {
        let mut state = self.enter_call("custody")?;
        debit(&mut state.wallet, asset, amount)?;
        credit(&mut state.vault, asset, amount);
        Ok(())
    }
}
