//! Infrastructure layer: storage, application services, config and the
//! background expiry sweeper.

pub mod config;
pub mod service;
pub mod store;
pub mod sweeper;


pub use config::EngineConfig;
pub use service::{
    CreateStockTaking, InventoryService, ServiceError, ServiceResult, StockTakingProduct,
    StockTakingService, SweepReport,
};
pub use store::{InMemoryInventoryStore, InventoryStore, LockWrite, StoreError, UnitOfWork};
pub use sweeper::{LockExpirySweeper, SweeperHandle, SweeperStats};
