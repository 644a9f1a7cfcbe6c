pub mod pnl;

pub use pnl::{FixedPnl, PnlModel, RandomPnl};

use chrono::Utc;
use tracing::{debug, info};

use common::{BalancePoint, Portfolio, Trade, TradeSide, TradingPair};

/// Fixed parameters of the paper account.
#[derive(Debug, Clone, Copy)]
pub struct LedgerConfig {
    /// Starting balance; `total_return` is always measured against it.
    pub initial_balance: f64,
    /// Quote-currency amount moved by every trade, regardless of price.
    pub trade_notional: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            trade_notional: 100.0,
        }
    }
}

/// Simulated paper-trading account.
///
/// Trades move a fixed notional in or out of the balance. Aggregate statistics
/// are recomputed from the full trade list after every execution.
pub struct PaperLedger {
    config: LedgerConfig,
    portfolio: Portfolio,
    pnl_model: Box<dyn PnlModel>,
}

impl PaperLedger {
    pub fn new(config: LedgerConfig, pnl_model: Box<dyn PnlModel>) -> Self {
        info!(
            balance = config.initial_balance,
            notional = config.trade_notional,
            "PaperLedger initialized"
        );
        Self {
            config,
            portfolio: Portfolio::new(config.initial_balance),
            pnl_model,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Execute a paper trade against `pair` at its current price.
    ///
    /// A BUY with less than one notional of balance does nothing and returns
    /// `None`; the only observable effect is that no trade is appended.
    pub fn execute(&mut self, pair: &TradingPair, side: TradeSide) -> Option<Trade> {
        let notional = self.config.trade_notional;

        if side == TradeSide::Buy && self.portfolio.balance < notional {
            debug!(
                symbol = %pair.symbol,
                balance = self.portfolio.balance,
                notional,
                "BUY skipped: insufficient balance"
            );
            return None;
        }

        let (balance, pnl) = match side {
            TradeSide::Buy => (self.portfolio.balance - notional, 0.0),
            TradeSide::Sell => (
                self.portfolio.balance + notional,
                self.pnl_model.sell_pnl(pair, notional),
            ),
        };

        let now = Utc::now();
        let trade = Trade::new(&pair.symbol, side, pair.price, notional, pnl, now);

        self.portfolio.balance = balance;
        self.portfolio.trades.push(trade.clone());
        self.portfolio.balance_history.push(BalancePoint {
            timestamp: now,
            balance,
        });
        self.recompute_stats();

        info!(
            symbol = %trade.symbol,
            side = %trade.side,
            price = trade.price,
            pnl = trade.pnl,
            balance = self.portfolio.balance,
            "Paper trade executed"
        );

        Some(trade)
    }

    fn recompute_stats(&mut self) {
        let p = &mut self.portfolio;
        let initial = self.config.initial_balance;

        p.total_pnl = p.trades.iter().map(|t| t.pnl).sum();
        p.total_return = if initial != 0.0 {
            (p.balance - initial) / initial * 100.0
        } else {
            0.0
        };
        p.win_rate = if p.trades.is_empty() {
            0.0
        } else {
            let wins = p.trades.iter().filter(|t| t.pnl > 0.0).count();
            wins as f64 / p.trades.len() as f64 * 100.0
        };
    }
}
