//! Adapters to the outside world: the accrual service over HTTP and CSV
//! import/export for the command-line front end.

pub mod accrual;
pub mod csv;
