//! Adapter registry: factory for creating exchange adapters from config.

use anyhow::Result;
use posrank_core::config::{AppConfig, ExchangeConfig};
use posrank_core::types::Exchange;

use crate::ExchangeAdapter;
use crate::cffex::CffexAdapter;
use crate::czce::CzceAdapter;
use crate::dce::DceAdapter;
use crate::shfe::ShfeAdapter;

/// Create the adapter named by `config.exchange`.
///
/// `app` supplies process-wide settings some adapters need (DCE's download
/// and extraction directories).
pub fn create_adapter(config: &ExchangeConfig, app: &AppConfig) -> Result<Box<dyn ExchangeAdapter>> {
    let adapter: Box<dyn ExchangeAdapter> = match config.exchange_id()? {
        Exchange::Cffex => Box::new(CffexAdapter::from_config(config)),
        Exchange::Czce => Box::new(CzceAdapter::from_config(config)),
        Exchange::Dce => Box::new(DceAdapter::from_config(config, app.download_dir(), app.extract_dir())),
        Exchange::Shfe => Box::new(ShfeAdapter::from_config(config)),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exchange_has_an_adapter() {
        let app = AppConfig::default();
        for exchange in Exchange::ALL {
            let adapter = create_adapter(&ExchangeConfig::for_exchange(exchange), &app).unwrap();
            assert_eq!(adapter.exchange(), exchange);
        }
    }

    #[test]
    fn worker_override() {
        let mut cfg = ExchangeConfig::for_exchange(Exchange::Dce);
        cfg.normalizer_workers = Some(5);
        let adapter = create_adapter(&cfg, &AppConfig::default()).unwrap();
        assert_eq!(adapter.normalizer_workers(), 5);
    }

    #[test]
    fn unknown_exchange() {
        let cfg = ExchangeConfig { exchange: "lme".into(), ..Default::default() };
        assert!(create_adapter(&cfg, &AppConfig::default()).is_err());
    }
}
