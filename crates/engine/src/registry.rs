use tracing::{info, warn};

use common::{Exchange, MarketType};

/// Exchanges known to the session and their enablement flags.
#[derive(Debug, Clone)]
pub struct ExchangeRegistry {
    exchanges: Vec<Exchange>,
}

impl ExchangeRegistry {
    pub fn new(exchanges: Vec<Exchange>) -> Self {
        Self { exchanges }
    }

    /// Build from a config list; an empty list yields the built-in exchanges.
    pub fn from_config(exchanges: Vec<Exchange>) -> Self {
        if exchanges.is_empty() {
            Self::default()
        } else {
            Self::new(exchanges)
        }
    }

    pub fn all(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter().filter(|e| e.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&Exchange> {
        self.exchanges.iter().find(|e| e.name == name)
    }

    /// Set the enabled flag of the named exchange.
    ///
    /// An unknown name changes nothing and returns `false`.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.exchanges.iter_mut().find(|e| e.name == name) {
            Some(exchange) => {
                exchange.enabled = enabled;
                info!(exchange = name, enabled, "Exchange toggled");
                true
            }
            None => {
                warn!(exchange = name, "Toggle ignored: unknown exchange");
                false
            }
        }
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        let exchange = |name: &str, pairs: [&str; 5]| Exchange {
            name: name.to_string(),
            enabled: true,
            market_type: MarketType::Future,
            pairs: pairs.iter().map(|s| s.to_string()).collect(),
        };

        Self::new(vec![
            exchange(
                "Binance",
                ["BTC/USDT", "ETH/USDT", "BNB/USDT", "ADA/USDT", "SOL/USDT"],
            ),
            exchange(
                "OKX",
                ["BTC/USDT", "ETH/USDT", "OKB/USDT", "DOT/USDT", "LINK/USDT"],
            ),
            exchange(
                "Huobi",
                ["BTC/USDT", "ETH/USDT", "HT/USDT", "LTC/USDT", "XRP/USDT"],
            ),
            exchange(
                "KuCoin",
                ["BTC/USDT", "ETH/USDT", "KCS/USDT", "MATIC/USDT", "AVAX/USDT"],
            ),
        ])
    }
}
