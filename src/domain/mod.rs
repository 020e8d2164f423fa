//! Domain layer: ledger value objects, the order state machine and the ports
//! through which the application talks to storage and the accrual service.

pub mod checksum;
pub mod money;
pub mod order;
pub mod ports;
pub mod transition;
