//! BLE central radio backed by btleplug
//!
//! btleplug only drives the central role, so this radio listens for HopeNet
//! service data but cannot broadcast. The engine treats that as a scan-only
//! device.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt;
use tracing::{info, warn};

use hopenet_core::{
    Challenge, ChallengeResponse, ChallengeTransport, PeerId, RadioCapability, RadioError,
    RawAdvertisement, ScanStream, SystemTimeSource, TimeSource,
};

use crate::config::RadioConfig;
use crate::error::RadioTransportError;

// ----------------------------------------------------------------------------
// BLE Radio
// ----------------------------------------------------------------------------

/// Scan-only radio on the first available BLE adapter
pub struct BleRadio {
    config: RadioConfig,
    adapter: Adapter,
    time_source: Arc<dyn TimeSource>,
}

impl BleRadio {
    /// Open the first BLE adapter on this host
    pub async fn connect(config: RadioConfig) -> Result<Self, RadioTransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| RadioTransportError::ManagerFailed(e.to_string()))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| RadioTransportError::ManagerFailed(e.to_string()))?
            .into_iter()
            .next()
            .ok_or(RadioTransportError::AdapterNotAvailable)?;

        info!("BLE adapter initialized");
        Ok(Self {
            config,
            adapter,
            time_source: Arc::new(SystemTimeSource::new()),
        })
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }
}

#[async_trait]
impl RadioCapability for BleRadio {
    async fn advertise(&self, _payload: &[u8]) -> Result<(), RadioError> {
        warn!("BLE advertising not supported on this host. Device will scan only.");
        Err(RadioTransportError::NotSupported {
            operation: "advertise".to_string(),
        }
        .into())
    }

    async fn stop_advertising(&self) -> Result<(), RadioError> {
        Ok(())
    }

    async fn scan(&self) -> Result<ScanStream, RadioError> {
        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| RadioTransportError::EventStreamFailed(e.to_string()))?;

        self.adapter
            .start_scan(ScanFilter {
                services: vec![self.config.service_uuid],
            })
            .await
            .map_err(|e| RadioTransportError::ScanFailed(e.to_string()))?;
        info!("Started BLE scanning for HopeNet peers");

        let adapter = self.adapter.clone();
        let service = self.config.service_uuid;
        let time_source = Arc::clone(&self.time_source);

        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let time_source = Arc::clone(&time_source);
            async move {
                let (id, bytes) = match event {
                    CentralEvent::ServiceDataAdvertisement { id, service_data } => {
                        let bytes = service_data.get(&service)?.clone();
                        (id, bytes)
                    }
                    _ => return None,
                };

                let signal_strength = match adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral
                        .properties()
                        .await
                        .ok()
                        .flatten()
                        .and_then(|props| props.rssi),
                    Err(_) => None,
                };

                Some(RawAdvertisement {
                    bytes,
                    signal_strength,
                    timestamp: time_source.now(),
                })
            }
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl ChallengeTransport for BleRadio {
    async fn send_challenge(
        &self,
        target: PeerId,
        _challenge: Challenge,
    ) -> Result<ChallengeResponse, RadioError> {
        Err(RadioTransportError::PeerUnreachable {
            peer: target.short(),
        }
        .into())
    }
}
