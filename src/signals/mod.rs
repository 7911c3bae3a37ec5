pub mod competition;
pub mod demand;
pub mod discount_cycle;
pub mod revenue;
pub mod risk;
pub mod trend;
