//! Interrupt-safe infrastructure shared by the RF driver and the
//! foreground task.
pub mod fifo;
