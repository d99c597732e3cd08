pub mod amount;
pub mod config;
pub mod csv;
pub mod directory;
pub mod engine;
pub mod model;
pub mod notify;
pub mod replay;

pub use amount::Amount;
pub use config::{EngineConfig, PayoutPolicy};
pub use engine::{PayoutEngine, PayoutError};
pub use model::{
    NewPayout, PaymentMethod, PayoutId, PayoutRequest, PayoutStatus, Scope, TransactionKind,
    UserId, WalletTransaction,
};
