//! Relay control facade.
//!
//! [`RelayControl`] is the single entry point front ends call. It turns a
//! [`TriggerRequest`] into one or more device attempts and folds their
//! outcomes into one [`TriggerResult`]. Device failures never escape as
//! errors; they become diagnostics.
//!
//! # Attempt Lifecycle
//!
//! ```text
//! resolve ──► spawn task ──► lock device ──► open ──► pulse ──► close ──► unlock
//! ```
//!
//! Every attempt runs on its own tokio task. Dropping the caller's future does
//! not abort a pulse that already started; the OFF frame is always sent.
//!
//! # Examples
//!
//! ```no_run
//! use relaygate_core::TriggerRequest;
//! use relaygate_hardware::{RelayControl, RelayControlConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let control = RelayControl::new(RelayControlConfig::default());
//!
//!     let result = control
//!         .trigger_relay(TriggerRequest::relay(1).with_duration_ms(500))
//!         .await;
//!     println!("{result}");
//! }
//! ```

use crate::config::RelayControlConfig;
use crate::devices::{AnyRelayBackend, BackendSet};
use crate::error::{HardwareError, Result};
use crate::locks::DeviceLocks;
use crate::pulse::{self, PulseOutcome};
use crate::registry::{AddressEntry, AddressSpace, DeviceRegistry};
use crate::traits::{RelayBackend, RelayLink};
use relaygate_core::{DeviceDescriptor, TriggerRequest, TriggerResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Entry point for triggering relays. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RelayControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug)]
struct ControlInner {
    config: RelayControlConfig,
    registry: DeviceRegistry,
    backends: BackendSet,
    locks: DeviceLocks,
}

impl RelayControl {
    /// Facade over the real USB, serial and network drivers.
    pub fn new(config: RelayControlConfig) -> Self {
        let registry = DeviceRegistry::new(&config);
        let backends = config.backends();
        Self::with_parts(config, registry, backends)
    }

    /// Facade over caller-supplied enumerators and backends.
    pub fn with_parts(
        config: RelayControlConfig,
        registry: DeviceRegistry,
        backends: BackendSet,
    ) -> Self {
        Self {
            inner: Arc::new(ControlInner {
                config,
                registry,
                backends,
                locks: DeviceLocks::new(),
            }),
        }
    }

    pub fn config(&self) -> &RelayControlConfig {
        &self.inner.config
    }

    /// Current flat address space, optionally limited to one brand.
    ///
    /// # Errors
    ///
    /// `HardwareError::UnknownBrand` if `brand` is not configured.
    pub async fn list_devices(&self, brand: Option<&str>) -> Result<AddressSpace> {
        let brand = brand.map(|name| self.resolve_brand(name)).transpose()?;
        Ok(self
            .inner
            .registry
            .build_address_space(brand.as_deref())
            .await)
    }

    /// Pulse the requested relay(s).
    ///
    /// - `relay_number` set: that relay alone; the brand is ignored.
    /// - `relay_number` unset: every discovered device, or only those of
    ///   `brand` when one is named, one after another. Succeeds if any of
    ///   them succeeded.
    pub async fn trigger_relay(&self, request: TriggerRequest) -> TriggerResult {
        self.trigger_relay_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`trigger_relay`](Self::trigger_relay); cancelling `cancel` ends
    /// any hold early. The OFF frame is still sent.
    pub async fn trigger_relay_with_cancel(
        &self,
        request: TriggerRequest,
        cancel: CancellationToken,
    ) -> TriggerResult {
        match request.relay_number {
            Some(relay_number) => {
                self.trigger_one(relay_number, request.duration_ms, cancel)
                    .await
            }
            None => {
                self.trigger_all(request.brand.as_deref(), request.duration_ms, cancel)
                    .await
            }
        }
    }

    async fn trigger_one(
        &self,
        relay_number: u32,
        duration_ms: Option<u64>,
        cancel: CancellationToken,
    ) -> TriggerResult {
        let space = self.inner.registry.build_address_space(None).await;
        if space.is_empty() {
            warn!(relay = relay_number, "No relay devices discovered");
            return TriggerResult::failure(HardwareError::Discovery.to_string());
        }

        match space.resolve(relay_number) {
            Ok(entry) => self.spawn_attempt(entry.clone(), duration_ms, cancel).await,
            Err(e) => {
                warn!(relay = relay_number, error = %e, "Relay number rejected");
                TriggerResult::failure(e.to_string())
            }
        }
    }

    async fn trigger_all(
        &self,
        brand: Option<&str>,
        duration_ms: Option<u64>,
        cancel: CancellationToken,
    ) -> TriggerResult {
        let brand = match brand.map(|name| self.resolve_brand(name)).transpose() {
            Ok(brand) => brand,
            Err(e) => {
                warn!(error = %e, "Unknown relay brand");
                return TriggerResult::failure(e.to_string());
            }
        };
        let scope = brand.as_deref().unwrap_or("all");

        let space = self.inner.registry.build_address_space(brand.as_deref()).await;
        if space.is_empty() {
            warn!(brand = scope, "No relay devices discovered");
            return TriggerResult::failure(HardwareError::Discovery.to_string());
        }

        let mut results = Vec::with_capacity(space.len());
        for entry in &space {
            results.push(
                self.spawn_attempt(entry.clone(), duration_ms, cancel.clone())
                    .await,
            );
        }

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 && failed < results.len() {
            warn!(
                brand = scope,
                failed,
                total = results.len(),
                "Some relays failed to trigger"
            );
        }
        TriggerResult::aggregate(results)
    }

    fn resolve_brand(&self, name: &str) -> Result<String> {
        self.inner
            .config
            .resolve_brand(name)
            .map(str::to_string)
            .ok_or_else(|| HardwareError::unknown_brand(name))
    }

    async fn spawn_attempt(
        &self,
        entry: AddressEntry,
        duration_ms: Option<u64>,
        cancel: CancellationToken,
    ) -> TriggerResult {
        let hold = duration_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| entry.default_hold());
        let backend = self.inner.backends.for_transport(entry.transport()).clone();
        let locks = self.inner.locks.clone();
        let relay_number = entry.relay_number();

        let task = tokio::spawn(attempt(backend, locks, entry, hold, cancel));
        match task.await {
            Ok(result) => result,
            Err(e) => {
                let e = HardwareError::from(e);
                error!(relay = relay_number, error = %e, "Trigger task failed");
                TriggerResult::failure(format!("relay {relay_number}: {e}"))
            }
        }
    }
}

/// One device attempt, serialized against other attempts on the same device.
async fn attempt(
    backend: AnyRelayBackend,
    locks: DeviceLocks,
    entry: AddressEntry,
    hold: Duration,
    cancel: CancellationToken,
) -> TriggerResult {
    let descriptor = &entry.descriptor;
    let relay_number = entry.relay_number();
    let _guard = locks.acquire(&descriptor.identity_key()).await;

    if cancel.is_cancelled() {
        warn!(relay = relay_number, device = %descriptor, "Cancelled before start");
        return TriggerResult::failure(format!(
            "relay {relay_number} ({descriptor}): cancelled before start"
        ));
    }

    info!(
        relay = relay_number,
        device = %descriptor,
        hold_ms = hold.as_millis() as u64,
        "Triggering relay"
    );

    match pulse_device(&backend, descriptor, hold, &cancel).await {
        Ok(outcome) => {
            let mut diagnostic = if outcome.cancelled {
                format!("relay {relay_number} ({descriptor}) released early")
            } else {
                format!(
                    "relay {relay_number} ({descriptor}) pulsed for {}ms",
                    hold.as_millis()
                )
            };
            if outcome.off_retried {
                diagnostic.push_str(" after OFF retry");
            }
            info!(relay = relay_number, "Relay pulse complete");
            TriggerResult::ok(diagnostic)
        }
        Err(e) => {
            error!(relay = relay_number, device = %descriptor, error = %e, "Relay trigger failed");
            TriggerResult::failure(format!("relay {relay_number} ({descriptor}): {e}"))
        }
    }
}

/// Open, pulse, close. The link is closed whatever the pulse returned.
async fn pulse_device(
    backend: &AnyRelayBackend,
    descriptor: &DeviceDescriptor,
    hold: Duration,
    cancel: &CancellationToken,
) -> Result<PulseOutcome> {
    let mut link = backend.open(descriptor).await?;
    let result = pulse::run_pulse(&mut link, descriptor.channel, hold, cancel).await;

    if let Err(e) = link.close().await {
        warn!(device = %descriptor, error = %e, "Error closing relay link");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::AnyEnumerator;
    use crate::mock::{MockEnumerator, MockRelay, MockRelayHandle};
    use relaygate_core::TransportKind;
    use relaygate_core::constants::{CH340_PRODUCT_ID, CH340_VENDOR_ID, NO_DEVICE_DIAGNOSTIC};

    fn control_with_ports(ports: &[&str]) -> (RelayControl, MockRelayHandle) {
        let config = RelayControlConfig::default();
        let registry = DeviceRegistry::with_enumerators(
            &config,
            AnyEnumerator::Mock(MockEnumerator::new(TransportKind::Usb)),
            AnyEnumerator::Mock(MockEnumerator::serial_ports(
                CH340_VENDOR_ID,
                CH340_PRODUCT_ID,
                ports,
            )),
        );
        let (relay, handle) = MockRelay::new();
        let control = RelayControl::with_parts(config, registry, BackendSet::mock(&relay));
        (control, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_number_opens_only_that_device() {
        let (control, handle) = control_with_ports(&["A", "B"]);

        let result = control
            .trigger_relay(TriggerRequest::relay(2).with_duration_ms(10))
            .await;

        assert!(result.success, "{result}");
        assert_eq!(handle.open_count("serial:B"), 1);
        assert_eq!(handle.open_count("serial:A"), 0);
        assert_eq!(handle.frames("serial:B").len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_touches_nothing() {
        let (control, handle) = control_with_ports(&["A", "B"]);

        for relay_number in [0, 3] {
            let result = control.trigger_relay(TriggerRequest::relay(relay_number)).await;
            assert!(!result.success);
            assert!(result.diagnostic.contains("out of range"), "{result}");
        }
        assert_eq!(handle.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_no_devices() {
        let (control, handle) = control_with_ports(&[]);

        for request in [TriggerRequest::all(), TriggerRequest::relay(1)] {
            let result = control.trigger_relay(request).await;
            assert_eq!(result, TriggerResult::failure(NO_DEVICE_DIAGNOSTIC));
            assert_eq!(result.diagnostic, HardwareError::Discovery.to_string());
        }
        assert_eq!(handle.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_unknown_brand() {
        let (control, handle) = control_with_ports(&["A"]);

        let result = control
            .trigger_relay(TriggerRequest::all().with_brand("acme"))
            .await;

        assert_eq!(result, TriggerResult::failure("unknown relay brand: acme"));
        assert_eq!(handle.total_opens(), 0);
        assert!(matches!(
            control.list_devices(Some("acme")).await,
            Err(HardwareError::UnknownBrand(_))
        ));
    }

    #[tokio::test]
    async fn test_list_devices() {
        let (control, _handle) = control_with_ports(&["B", "A"]);

        let space = control.list_devices(None).await.unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.resolve(1).unwrap().descriptor.identity_key(), "serial:A");

        let msr = control.list_devices(Some("MSR")).await.unwrap();
        assert!(msr.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_sends_nothing() {
        let (control, handle) = control_with_ports(&["A"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = control
            .trigger_relay_with_cancel(TriggerRequest::relay(1), cancel)
            .await;

        assert!(!result.success);
        assert_eq!(handle.total_opens(), 0);
    }
}
