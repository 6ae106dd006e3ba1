pub mod calculator;
pub mod config;
pub mod error;
pub mod exchange;
pub mod facade;
pub mod registry;
pub mod repo;
pub mod service;
pub mod top_index;
pub mod types;

pub use calculator::PairCalculator;
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use exchange::ExchangeAdapter;
pub use facade::QueryFacade;
pub use registry::ExchangeRegistry;
pub use repo::{ArbitrageFilter, ArbitrageRepo, InMemoryArbitrageRepo, SortDirection};
pub use service::CalculateService;
pub use top_index::TopIndex;
pub use types::*;
