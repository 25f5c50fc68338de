// Discovery Source Port
// One implementation per radio modality (classic inquiry, BLE advertisement scan)

use crate::domain::{Modality, Sighting};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Discovery failures; both kinds degrade only the failing modality
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Optional library or tool missing (warning, empty result)
    #[error("Discovery unavailable: {0}")]
    Unavailable(String),

    /// OS-level failure such as missing permissions (error, empty result)
    #[error("Discovery failed: {0}")]
    Os(String),
}

/// Discovery source trait
///
/// Sources push sightings into `sink` as they are observed; the fusion engine
/// owns the only receiver and performs the merge.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Modality this source observes (Classic or Ble)
    fn modality(&self) -> Modality;

    /// Scan for up to `duration`
    ///
    /// # Returns
    /// Number of sightings sent to `sink`
    async fn discover(
        &self,
        duration: Duration,
        sink: mpsc::Sender<Sighting>,
    ) -> Result<usize, DiscoveryError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock source that replays a fixed set of sightings
    pub struct MockDiscoverySource {
        modality: Modality,
        sightings: Mutex<Vec<Sighting>>,
        failure: Option<DiscoveryError>,
        delay_per_sighting: Duration,
        call_count: AtomicUsize,
    }

    impl MockDiscoverySource {
        pub fn new(modality: Modality, sightings: Vec<Sighting>) -> Self {
            Self {
                modality,
                sightings: Mutex::new(sightings),
                failure: None,
                delay_per_sighting: Duration::ZERO,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn empty(modality: Modality) -> Self {
            Self::new(modality, Vec::new())
        }

        pub fn failing(modality: Modality, error: DiscoveryError) -> Self {
            let mut source = Self::empty(modality);
            source.failure = Some(error);
            source
        }

        /// Pause between sightings (lets tests interleave two sources)
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay_per_sighting = delay;
            self
        }

        /// Replace what the next discover() call replays
        pub fn set_sightings(&self, sightings: Vec<Sighting>) {
            *self.sightings.lock().unwrap() = sightings;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DiscoverySource for MockDiscoverySource {
        fn modality(&self) -> Modality {
            self.modality
        }

        async fn discover(
            &self,
            _duration: Duration,
            sink: mpsc::Sender<Sighting>,
        ) -> Result<usize, DiscoveryError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(err) = &self.failure {
                return Err(err.clone());
            }

            let sightings = self.sightings.lock().unwrap().clone();
            let mut sent = 0;
            for sighting in sightings {
                if !self.delay_per_sighting.is_zero() {
                    tokio::time::sleep(self.delay_per_sighting).await;
                }
                if sink.send(sighting).await.is_err() {
                    break;
                }
                sent += 1;
            }
            Ok(sent)
        }
    }
}
