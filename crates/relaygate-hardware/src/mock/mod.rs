//! Mock transports for testing and development.
//!
//! These stand in for the USB, serial and network drivers so the registry and
//! the control facade can be exercised without hardware attached.

pub mod enumerator;
pub mod relay;

pub use enumerator::MockEnumerator;
pub use relay::{MockEvent, MockEventKind, MockLink, MockRelay, MockRelayHandle};
