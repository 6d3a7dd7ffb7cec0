mod evaluator;
mod ledger;

pub use evaluator::{can_read, can_share};
pub use ledger::SharingLedger;
