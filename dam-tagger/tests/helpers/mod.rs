//! Shared utilities for dam-tagger integration tests

#![allow(dead_code)]

pub mod log_capture;
pub mod mock_dam;

pub use log_capture::{init_test_logging, LogCapture};
pub use mock_dam::{MockDam, MOCK_IDENTITY, MOCK_SECRET};

use dam_common::events::EventBus;
use dam_common::DamConfig;
use dam_tagger::DamService;

/// Config pointing at `mock` with valid credentials and no throttling to speak of
pub fn config_for(mock: &MockDam) -> DamConfig {
    DamConfig::new(&mock.base_url)
        .with_credentials(MOCK_IDENTITY, MOCK_SECRET)
        .with_requests_per_second(1000)
}

pub fn service_for(mock: &MockDam) -> DamService {
    DamService::from_config(config_for(mock), EventBus::new(100)).unwrap()
}
