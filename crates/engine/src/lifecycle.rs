use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock, RwLockReadGuard};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use common::{
    CandleFeed, DashboardEvent, Error, MarketType, PairKey, Result, SignalFilter, Trade,
    TradeSide, TradeSignal,
};
use strategy::PairAnalyzer;

use crate::session::Session;
use crate::snapshot::{build_snapshot, SnapshotDiff};

/// Timer and feed settings for the engine loop.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub refresh_interval: Duration,
    pub auto_trade_interval: Duration,
    /// Candles per pair, not counting the seed candle.
    pub candle_history: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            auto_trade_interval: Duration::from_secs(60),
            candle_history: 50,
        }
    }
}

/// Commands sent to the engine via the command channel.
/// Every command is acknowledged once its effect is visible in the session.
#[derive(Debug)]
pub enum EngineCommand {
    Refresh {
        reply: oneshot::Sender<()>,
    },
    ToggleExchange {
        name: String,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    ExecuteTrade {
        key: PairKey,
        side: TradeSide,
        reply: oneshot::Sender<Option<Trade>>,
    },
    SetAutoTrading {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    SetSignalFilter {
        filter: SignalFilter,
        reply: oneshot::Sender<()>,
    },
    SetMarketType {
        market: Option<MarketType>,
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle passed to the API.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    session: Arc<RwLock<Session>>,
    event_tx: broadcast::Sender<DashboardEvent>,
}

impl EngineHandle {
    /// Read access to the current session. Do not hold across awaits.
    pub async fn session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().await
    }

    /// Subscribe to the dashboard event broadcast.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.event_tx.subscribe()
    }

    pub async fn refresh(&self) -> Result<()> {
        self.request(|reply| EngineCommand::Refresh { reply }).await
    }

    /// Returns `false` if no exchange has that name.
    pub async fn toggle_exchange(&self, name: impl Into<String>, enabled: bool) -> Result<bool> {
        let name = name.into();
        self.request(|reply| EngineCommand::ToggleExchange {
            name,
            enabled,
            reply,
        })
        .await
    }

    /// Returns `None` when nothing was executed: unknown pair or insufficient
    /// balance for a BUY.
    pub async fn execute_trade(&self, key: PairKey, side: TradeSide) -> Result<Option<Trade>> {
        self.request(|reply| EngineCommand::ExecuteTrade { key, side, reply })
            .await
    }

    pub async fn set_auto_trading(&self, enabled: bool) -> Result<()> {
        self.request(|reply| EngineCommand::SetAutoTrading { enabled, reply })
            .await
    }

    pub async fn set_signal_filter(&self, filter: SignalFilter) -> Result<()> {
        self.request(|reply| EngineCommand::SetSignalFilter { filter, reply })
            .await
    }

    pub async fn set_market_type(&self, market: Option<MarketType>) -> Result<()> {
        self.request(|reply| EngineCommand::SetMarketType { market, reply })
            .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| Error::EngineUnavailable("command channel closed".into()))?;
        rx.await
            .map_err(|_| Error::EngineUnavailable("engine dropped the reply".into()))
    }
}

/// The dashboard engine: owns the session and drives the refresh and
/// auto-trade timers on a single task.
pub struct Engine {
    settings: EngineSettings,
    feed: Arc<dyn CandleFeed>,
    analyzer: PairAnalyzer,
    session: Arc<RwLock<Session>>,
    command_rx: mpsc::Receiver<EngineCommand>,
    event_tx: broadcast::Sender<DashboardEvent>,
    rng: StdRng,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        feed: Arc<dyn CandleFeed>,
        analyzer: PairAnalyzer,
        session: Session,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(256);
        let session = Arc::new(RwLock::new(session));

        let handle = EngineHandle {
            command_tx,
            session: session.clone(),
            event_tx: event_tx.clone(),
        };

        let engine = Engine {
            settings,
            feed,
            analyzer,
            session,
            command_rx,
            event_tx,
            rng: StdRng::from_entropy(),
        };

        (engine, handle)
    }

    /// Run the engine until every handle is dropped. Call from `tokio::spawn`.
    ///
    /// The first refresh happens immediately.
    pub async fn run(mut self) {
        info!(
            refresh = ?self.settings.refresh_interval,
            auto_trade = ?self.settings.auto_trade_interval,
            history = self.settings.candle_history,
            "Engine running"
        );

        let mut refresh = tokio::time::interval(self.settings.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut auto_trade = if self.session.read().await.auto_trading {
            Some(self.auto_trade_interval())
        } else {
            None
        };

        loop {
            tokio::select! {
                _ = refresh.tick() => self.refresh().await,

                _ = next_tick(&mut auto_trade) => self.auto_trade().await,

                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd, &mut auto_trade).await,
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&mut self, cmd: EngineCommand, auto_trade: &mut Option<Interval>) {
        match cmd {
            EngineCommand::Refresh { reply } => {
                self.refresh().await;
                let _ = reply.send(());
            }

            EngineCommand::ToggleExchange {
                name,
                enabled,
                reply,
            } => {
                let found = self.session.write().await.registry.set_enabled(&name, enabled);
                if found {
                    let _ = self
                        .event_tx
                        .send(DashboardEvent::ExchangeToggled { name, enabled });
                    self.refresh().await;
                }
                let _ = reply.send(found);
            }

            EngineCommand::ExecuteTrade { key, side, reply } => {
                let mut session = self.session.write().await;
                let trade = match session.pairs.iter().position(|p| p.key() == key) {
                    Some(idx) => self.execute(&mut session, idx, side),
                    None => {
                        warn!(pair = %key, "Trade ignored: pair not in current snapshot");
                        None
                    }
                };
                let _ = reply.send(trade);
            }

            EngineCommand::SetAutoTrading { enabled, reply } => {
                let mut session = self.session.write().await;
                if session.auto_trading != enabled {
                    session.auto_trading = enabled;
                    *auto_trade = enabled.then(|| self.auto_trade_interval());
                    info!(enabled, "Auto trading toggled");
                    let _ = self
                        .event_tx
                        .send(DashboardEvent::AutoTradingChanged { enabled });
                }
                let _ = reply.send(());
            }

            EngineCommand::SetSignalFilter { filter, reply } => {
                self.session.write().await.signal_filter = filter;
                debug!(?filter, "Signal filter set");
                let _ = reply.send(());
            }

            EngineCommand::SetMarketType { market, reply } => {
                self.session.write().await.market_type = market;
                debug!(?market, "Market type selection set");
                let _ = reply.send(());
            }
        }
    }

    /// Replace the snapshot wholesale. On feed failure the previous snapshot stays.
    async fn refresh(&mut self) {
        let registry = self.session.read().await.registry.clone();

        let pairs = match build_snapshot(
            self.feed.as_ref(),
            &registry,
            &self.analyzer,
            self.settings.candle_history,
        )
        .await
        {
            Ok(pairs) => pairs,
            Err(e) => {
                error!(error = %e, "Snapshot refresh failed, keeping previous snapshot");
                return;
            }
        };

        let pair_count = pairs.len();
        let signal_count = pairs.iter().filter(|p| p.signal != TradeSignal::Hold).count();

        let previous = self.session.write().await.replace_pairs(pairs);
        let diff = SnapshotDiff::between(&previous, self.session.read().await.pairs());
        if diff.is_empty() {
            debug!("Snapshot membership and signals unchanged");
        } else {
            for change in &diff.signal_changes {
                info!(pair = %change.key, from = %change.from, to = %change.to, "Signal changed");
            }
            if !diff.added.is_empty() || !diff.removed.is_empty() {
                debug!(
                    added = diff.added.len(),
                    removed = diff.removed.len(),
                    "Snapshot membership changed"
                );
            }
        }

        info!(pairs = pair_count, signals = signal_count, "Snapshot refreshed");
        let _ = self.event_tx.send(DashboardEvent::PairsRefreshed {
            pair_count,
            signal_count,
            timestamp: Utc::now(),
        });
    }

    /// Trade one randomly chosen actionable pair, if any.
    async fn auto_trade(&mut self) {
        let mut session = self.session.write().await;
        if !session.auto_trading {
            return;
        }

        let picked = session
            .auto_trade_candidates(&self.analyzer)
            .collect::<Vec<_>>()
            .choose(&mut self.rng)
            .and_then(|p| Some((p.key(), p.signal.side()?)));

        let Some((key, side)) = picked else {
            debug!("Auto-trade tick: no actionable pairs");
            return;
        };
        let Some(idx) = session.pairs.iter().position(|p| p.key() == key) else {
            return;
        };

        info!(pair = %key, %side, "Auto-trade selected pair");
        self.execute(&mut session, idx, side);
    }

    fn execute(&self, session: &mut Session, idx: usize, side: TradeSide) -> Option<Trade> {
        let Session { ledger, pairs, .. } = session;
        let trade = ledger.execute(&pairs[idx], side)?;
        let _ = self.event_tx.send(DashboardEvent::TradeExecuted {
            trade: trade.clone(),
            balance: ledger.portfolio().balance,
        });
        Some(trade)
    }

    fn auto_trade_interval(&self) -> Interval {
        let period = self.settings.auto_trade_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }
}

/// Tick an optional interval; pending forever when there is none.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use common::Candle;
    use paper::{FixedPnl, LedgerConfig, PaperLedger};

    use crate::feed::MockFeed;
    use crate::registry::ExchangeRegistry;

    /// Rising closes with a 5× volume spike on the last candle: every pair is BUY.
    struct SpikeFeed;

    #[async_trait]
    impl CandleFeed for SpikeFeed {
        async fn candles(&self, _: &str, _: &str, len: usize) -> Result<Vec<Candle>> {
            let start = Utc::now() - ChronoDuration::days(len as i64);
            Ok((0..len)
                .map(|i| {
                    let close = 100.0 + i as f64;
                    let volume = if i + 1 == len { 5_000.0 } else { 1_000.0 };
                    Candle::new(
                        start + ChronoDuration::days(i as i64),
                        close,
                        close,
                        close,
                        close,
                        volume,
                    )
                })
                .collect())
        }
    }

    /// Flat closes with a volume spike: averages coincide, so every pair is HOLD.
    struct FlatSpikeFeed;

    #[async_trait]
    impl CandleFeed for FlatSpikeFeed {
        async fn candles(&self, _: &str, _: &str, len: usize) -> Result<Vec<Candle>> {
            let start = Utc::now() - ChronoDuration::days(len as i64);
            Ok((0..len)
                .map(|i| {
                    let volume = if i + 1 == len { 9_000.0 } else { 1_000.0 };
                    Candle::new(
                        start + ChronoDuration::days(i as i64),
                        100.0,
                        100.0,
                        100.0,
                        100.0,
                        volume,
                    )
                })
                .collect())
        }
    }

    fn spawn_engine(feed: Arc<dyn CandleFeed>) -> EngineHandle {
        let session = Session::new(
            ExchangeRegistry::default(),
            PaperLedger::new(LedgerConfig::default(), Box::new(FixedPnl(1.0))),
        );
        let (engine, handle) =
            Engine::new(EngineSettings::default(), feed, PairAnalyzer::default(), session);
        tokio::spawn(engine.run());
        handle
    }

    #[tokio::test]
    async fn refresh_populates_snapshot() {
        let handle = spawn_engine(Arc::new(MockFeed::seeded(11)));
        handle.refresh().await.unwrap();

        let session = handle.session().await;
        assert_eq!(session.pairs().len(), 20);
        assert!(session.pairs().iter().all(|p| p.candles.len() == 51));
    }

    #[tokio::test]
    async fn toggle_is_visible_to_next_snapshot() {
        let handle = spawn_engine(Arc::new(MockFeed::seeded(12)));
        handle.refresh().await.unwrap();

        assert!(handle.toggle_exchange("KuCoin", false).await.unwrap());
        {
            let session = handle.session().await;
            assert_eq!(session.pairs().len(), 15);
            assert!(session.pairs().iter().all(|p| p.exchange != "KuCoin"));
        }

        assert!(handle.toggle_exchange("KuCoin", true).await.unwrap());
        assert_eq!(handle.session().await.pairs().len(), 20);
    }

    #[tokio::test]
    async fn toggling_unknown_exchange_changes_nothing() {
        let handle = spawn_engine(Arc::new(MockFeed::seeded(13)));
        let before: Vec<bool> = handle
            .session()
            .await
            .registry()
            .all()
            .iter()
            .map(|e| e.enabled)
            .collect();

        assert!(!handle.toggle_exchange("Nowhere", false).await.unwrap());

        let after: Vec<bool> = handle
            .session()
            .await
            .registry()
            .all()
            .iter()
            .map(|e| e.enabled)
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn manual_trade_updates_portfolio() {
        let handle = spawn_engine(Arc::new(SpikeFeed));
        handle.refresh().await.unwrap();

        let key = handle.session().await.pairs()[0].key();
        let mut events = handle.subscribe_events();

        let trade = handle
            .execute_trade(key.clone(), TradeSide::Buy)
            .await
            .unwrap()
            .expect("trade executed");
        assert_eq!(trade.symbol, key.symbol);
        assert_eq!(trade.price, 150.0);
        assert_eq!(handle.session().await.portfolio().balance, 900.0);

        match events.recv().await.unwrap() {
            DashboardEvent::TradeExecuted { balance, .. } => assert_eq!(balance, 900.0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn trade_on_unknown_pair_is_ignored() {
        let handle = spawn_engine(Arc::new(SpikeFeed));
        handle.refresh().await.unwrap();

        let res = handle
            .execute_trade(PairKey::new("Binance", "DOGE/USDT"), TradeSide::Sell)
            .await
            .unwrap();
        assert!(res.is_none());
        assert!(handle.session().await.portfolio().trades.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_trading_executes_on_tick() {
        let handle = spawn_engine(Arc::new(SpikeFeed));
        handle.refresh().await.unwrap();
        let mut events = handle.subscribe_events();

        handle.set_auto_trading(true).await.unwrap();

        let trade = tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if let Ok(DashboardEvent::TradeExecuted { trade, .. }) = events.recv().await {
                    return trade;
                }
            }
        })
        .await
        .expect("auto trade within two minutes");

        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(handle.session().await.portfolio().trades.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_trading_skips_hold_only_snapshot() {
        let handle = spawn_engine(Arc::new(FlatSpikeFeed));
        handle.refresh().await.unwrap();
        {
            let session = handle.session().await;
            assert!(session.pairs().iter().all(|p| p.signal == TradeSignal::Hold));
            assert!(session.pairs().iter().all(|p| p.volume_ratio >= 3.0));
        }

        handle.set_auto_trading(true).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert!(handle.session().await.auto_trading());
        assert!(handle.session().await.portfolio().trades.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_auto_trading_stops_ticks() {
        let handle = spawn_engine(Arc::new(SpikeFeed));
        handle.refresh().await.unwrap();

        handle.set_auto_trading(true).await.unwrap();
        handle.set_auto_trading(false).await.unwrap();
        assert!(!handle.session().await.auto_trading());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(handle.session().await.portfolio().trades.is_empty());
    }

    #[tokio::test]
    async fn filter_and_market_selection_apply_to_visible_pairs() {
        let handle = spawn_engine(Arc::new(SpikeFeed));
        handle.refresh().await.unwrap();

        handle.set_signal_filter(SignalFilter::Sell).await.unwrap();
        assert_eq!(handle.session().await.visible_pairs().count(), 0);

        handle.set_signal_filter(SignalFilter::Buy).await.unwrap();
        assert_eq!(handle.session().await.visible_pairs().count(), 20);

        handle.set_market_type(Some(MarketType::Spot)).await.unwrap();
        assert_eq!(handle.session().await.visible_pairs().count(), 0);
        assert_eq!(handle.session().await.pairs().len(), 20);
    }
}
