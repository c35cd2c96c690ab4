pub mod errors;
pub mod inventory;
pub mod order;
pub mod ports;
pub mod state_machine;
