pub mod fleet;
pub mod not_found;
pub mod supply_chain;
