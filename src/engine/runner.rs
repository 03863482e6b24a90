use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::config::AppConfig;
use crate::engine::executor::{self, ExecutionReport};
use crate::engine::reconcile;
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::indicators::IndicatorSet;
use crate::persistence::ScalarStore;
use crate::risk::RiskLimits;
use crate::snapshot::{self, MarketSnapshot};
use crate::strategy::{self, SignalSet, Strategy};

/// Summary of one market's pass through the pipeline.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub market: String,
    pub planned: usize,
    pub report: ExecutionReport,
}

/// Drives snapshot -> indicators -> signals -> plan -> execute for every
/// configured market, one market at a time, end to end.
pub struct Engine<C, S> {
    client: C,
    store: S,
    strategy: Box<dyn Strategy>,
    limits: RiskLimits,
    config: AppConfig,
}

impl<C: ExchangeClient, S: ScalarStore> Engine<C, S> {
    pub fn new(client: C, store: S, config: AppConfig) -> Result<Self> {
        let strategy = strategy::from_config(&config.strategy);
        let limits = RiskLimits::from_config(&config.strategy)?;
        Ok(Self {
            client,
            store,
            strategy,
            limits,
            config,
        })
    }

    /// One full pass over every configured market, sequentially. Errors are
    /// market-local: a failed snapshot or plan skips to the next market and
    /// the next tick picks up from fresh exchange state.
    pub async fn run_cycle(&self) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::new();
        for market in &self.config.engine.markets {
            match self.run_market(market).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(market = %market, error = %e, "market cycle aborted");
                }
            }
        }
        outcomes
    }

    async fn run_market(&self, market: &str) -> Result<CycleOutcome> {
        let target_sigma = match self.store.load_scalar(market).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(market = %market, error = %e, "scalar load failed, treating as absent");
                None
            }
        };

        let snapshot = snapshot::build(
            &self.client,
            market,
            &self.config.exchange.resolution,
            self.config.exchange.candle_limit,
            target_sigma,
        )
        .await?;

        if snapshot.candles.len() < self.strategy.min_candles() {
            tracing::debug!(
                market = %market,
                have = snapshot.candles.len(),
                want = self.strategy.min_candles(),
                "short candle history, evaluating on narrowed windows"
            );
        }

        let closes: Vec<f64> = snapshot.candles.iter().map(|c| c.close).collect();
        let indicators = IndicatorSet::compute(
            &closes,
            self.config.strategy.bollinger_length,
            self.config.strategy.bollinger_num_stdev,
            self.config.strategy.rsi_length,
        );

        let signals = self.strategy.compute_signals(&snapshot, &indicators)?;
        let actions = reconcile::plan(&snapshot, &signals, &self.limits)?;

        if actions.is_empty() {
            tracing::debug!(market = %market, "order set already at target");
            return Ok(CycleOutcome {
                market: market.to_string(),
                planned: 0,
                report: ExecutionReport::default(),
            });
        }

        tracing::info!(
            market = %market,
            actions = actions.len(),
            strategy = self.strategy.name(),
            "executing reconciliation plan"
        );
        let report =
            executor::execute_actions(&self.client, &snapshot.account.position_id, &actions).await;

        self.record_entry_sigma(&snapshot, &signals, &indicators, report)
            .await;

        Ok(CycleOutcome {
            market: market.to_string(),
            planned: actions.len(),
            report,
        })
    }

    /// After a submitted entry, persist the band deviation so the exit side
    /// of a reversion trade can price against the volatility seen at entry.
    async fn record_entry_sigma(
        &self,
        snapshot: &MarketSnapshot,
        signals: &SignalSet,
        indicators: &IndicatorSet,
        report: ExecutionReport,
    ) {
        let entered = signals.long.entry || signals.short.entry;
        if !entered || report.submitted == 0 {
            return;
        }
        let Some(band) = indicators.last_band() else {
            return;
        };
        let sigma = band.deviation(self.config.strategy.bollinger_num_stdev);
        if let Err(e) = self.store.save_scalar(&snapshot.market, sigma).await {
            tracing::warn!(market = %snapshot.market, error = %e, "failed to record entry deviation");
        }
    }

    /// Periodic loop. The next tick is not awaited until the cycle body has
    /// finished, so consecutive invocations can never overlap; ticks missed
    /// during a long cycle are skipped, not replayed.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = interval_at(
            Instant::now(),
            Duration::from_secs(self.config.engine.interval_secs),
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let outcomes = self.run_cycle().await;

            let planned: usize = outcomes.iter().map(|o| o.planned).sum();
            let submitted: usize = outcomes.iter().map(|o| o.report.submitted).sum();
            let failed: usize = outcomes.iter().map(|o| o.report.failed).sum();
            tracing::info!(
                markets = outcomes.len(),
                planned,
                submitted,
                failed,
                "cycle complete"
            );
        }
    }
}
