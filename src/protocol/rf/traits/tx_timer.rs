//! One-shot hardware timer abstraction used to start transmissions at
//! absolute microsecond deadlines.

/// A one-shot timer firing the RF driver's timer interrupt.
///
/// Arming replaces any previously armed deadline; at most one transmission
/// is armed at any instant. Implementations with a bounded maximum period
/// (some platforms cap out near 50 ms) may fire early after arming their
/// maximum; the driver detects the early wakeup and re-arms for the
/// remainder.
pub trait TxTimer {
    /// Fire the timer interrupt `delay_us` microseconds from now.
    fn arm(&mut self, delay_us: u32);
    /// Cancel any armed deadline.
    fn stop(&mut self);
}
