pub mod daemon;
pub mod invest;
pub mod ledger;
pub mod salary;
pub mod setup;
pub mod ui;
