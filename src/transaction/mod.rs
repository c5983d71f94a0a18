pub mod model;
pub mod pool;

pub use model::{COINBASE_SENDER, Transaction};
pub use pool::TransactionPool;
