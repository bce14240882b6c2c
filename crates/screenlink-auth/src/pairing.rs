//! Device pairing flow
//!
//! Coordinates the device code store, the remote verifier and the
//! presentation layer:
//! 1. A pairing callback delivers a fresh code, which is persisted
//! 2. On startup or on demand the stored code is read and verified
//! 3. The outcome is broadcast as a `PairingEvent`
//!
//! Each verification is tagged with the code it was started for and a
//! generation number bumped by every status check and callback. When it
//! completes, its result is published only if both still match; otherwise
//! a newer check has superseded it and the result is dropped.

use crate::device::{DeviceCode, DeviceIdentity};
use crate::storage::{DeviceCodeStore, StorageError};
use crate::verifier::{DeviceVerifier, VerificationError, VerifyResult};
use screenlink_core::RendererMessage;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Default upper bound for one verification round trip
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Renderer payload when no usable device code exists
pub const CODE_NOT_AVAILABLE: &str = "Device code not available";

/// Renderer payload when a delivered code could not be saved
pub const CODE_NOT_SAVED: &str = "Device code could not be saved";

/// Pairing errors
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Failed to save device code: {0}")]
    SaveFailed(#[from] StorageError),
    #[error("Authentication required: pair this device first")]
    AuthenticationRequired,
    #[error("Failed to read device code: {0}")]
    ReadFailed(#[source] StorageError),
    #[error("Device code could not be verified: {0}")]
    Unverified(#[source] VerificationError),
    #[error("Pairing changed while it was being verified")]
    Superseded,
}

pub type PairingResult<T> = Result<T, PairingError>;

/// Pairing state for the current run
#[derive(Debug, Clone, PartialEq)]
pub enum PairingStatus {
    /// No code stored, or the stored code failed verification
    Unpaired,
    /// A code is stored and being checked
    Verifying { code: DeviceCode },
    /// The stored code was accepted by the service
    Paired {
        code: DeviceCode,
        device: DeviceIdentity,
    },
}

/// Notification for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum PairingEvent {
    /// Nothing is stored; the user has never paired this installation
    Unpaired,
    /// The stored code is valid
    Paired {
        code: DeviceCode,
        device: DeviceIdentity,
    },
    /// A stored code exists but could not be confirmed
    VerificationFailed { reason: String },
    /// A freshly delivered code could not be persisted
    PairingSaveFailed { reason: String },
}

impl PairingEvent {
    /// The `device-code` message the renderer expects for this outcome
    pub fn renderer_message(&self) -> RendererMessage {
        let payload = match self {
            PairingEvent::Unpaired => String::new(),
            PairingEvent::Paired { code, .. } => code.as_str().to_string(),
            PairingEvent::VerificationFailed { .. } => CODE_NOT_AVAILABLE.to_string(),
            PairingEvent::PairingSaveFailed { .. } => CODE_NOT_SAVED.to_string(),
        };
        RendererMessage::DeviceCode(payload)
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, PairingEvent::Paired { .. })
    }
}

struct Tracked {
    /// Mirror of the persisted code; every store write goes through here
    current: Option<DeviceCode>,
    /// Bumped whenever a check starts or the stored code changes
    generation: u64,
    status: PairingStatus,
}

/// First half of a status check, decided under the state lock
enum StatusCheck {
    Verify { code: DeviceCode, generation: u64 },
    Unpaired,
    ReadFailed(StorageError),
}

/// Drives the pairing state machine
pub struct PairingController<V> {
    store: DeviceCodeStore,
    verifier: V,
    events: broadcast::Sender<PairingEvent>,
    state: Mutex<Tracked>,
    verify_timeout: Duration,
}

impl<V: DeviceVerifier> PairingController<V> {
    /// Create a new pairing controller
    pub fn new(store: DeviceCodeStore, verifier: V) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            store,
            verifier,
            events,
            state: Mutex::new(Tracked {
                current: None,
                generation: 0,
                status: PairingStatus::Unpaired,
            }),
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    /// Set the verification timeout
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Receive every published pairing event
    pub fn subscribe(&self) -> broadcast::Receiver<PairingEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &DeviceCodeStore {
        &self.store
    }

    /// Snapshot of the current state
    pub async fn status(&self) -> PairingStatus {
        self.state.lock().await.status.clone()
    }

    /// Handle a code delivered by a pairing callback
    ///
    /// Persists the code, replacing any previous one, then verifies it.
    /// Returns the published event, or `None` if a newer check superseded
    /// this one while it was being verified.
    pub async fn on_pairing_callback(&self, code: DeviceCode) -> Option<PairingEvent> {
        info!("Received pairing callback with device code {}", code.redacted());
        let generation = {
            let mut state = self.state.lock().await;
            if let Err(e) = self.store.write(&code).await {
                warn!("Failed to save device code: {}", e);
                let event = PairingEvent::PairingSaveFailed {
                    reason: PairingError::SaveFailed(e).to_string(),
                };
                self.publish(&event);
                return Some(event);
            }
            state.generation += 1;
            state.current = Some(code.clone());
            state.status = PairingStatus::Verifying { code: code.clone() };
            state.generation
        };
        let result = self.verify(&code).await;
        self.settle(code, generation, &result).await
    }

    /// Read the stored code, verify it and publish the outcome
    ///
    /// Always asks the service again; validity is never cached because a
    /// pairing can be revoked remotely at any time.
    pub async fn get_status(&self) -> Option<PairingEvent> {
        match self.start_check().await {
            StatusCheck::Verify { code, generation } => {
                let result = self.verify(&code).await;
                self.settle(code, generation, &result).await
            }
            StatusCheck::Unpaired => Some(PairingEvent::Unpaired),
            StatusCheck::ReadFailed(e) => Some(PairingEvent::VerificationFailed {
                reason: e.to_string(),
            }),
        }
    }

    /// Run a status check and return the code if it is currently valid
    ///
    /// `AuthenticationRequired` means there is no code or the service
    /// refused it; other errors keep the reason the check could not finish.
    pub async fn verified_code(&self) -> PairingResult<DeviceCode> {
        let (code, generation) = match self.start_check().await {
            StatusCheck::Verify { code, generation } => (code, generation),
            StatusCheck::Unpaired => return Err(PairingError::AuthenticationRequired),
            StatusCheck::ReadFailed(e) => return Err(PairingError::ReadFailed(e)),
        };
        let result = self.verify(&code).await;
        let published = self.settle(code.clone(), generation, &result).await;

        match result {
            Ok(_) if published.is_some() => Ok(code),
            Ok(_) => Err(PairingError::Superseded),
            Err(e) if e.is_rejection() => Err(PairingError::AuthenticationRequired),
            Err(e) => Err(PairingError::Unverified(e)),
        }
    }

    /// Read the store and tag a new check, publishing early outcomes
    async fn start_check(&self) -> StatusCheck {
        let mut state = self.state.lock().await;
        state.generation += 1;
        match self.store.load().await {
            Ok(Some(code)) => {
                state.current = Some(code.clone());
                state.status = PairingStatus::Verifying { code: code.clone() };
                StatusCheck::Verify {
                    code,
                    generation: state.generation,
                }
            }
            Ok(None) => {
                debug!("No device code stored");
                state.current = None;
                state.status = PairingStatus::Unpaired;
                self.publish(&PairingEvent::Unpaired);
                StatusCheck::Unpaired
            }
            Err(e) => {
                warn!("Failed to read device code: {}", e);
                state.status = PairingStatus::Unpaired;
                self.publish(&PairingEvent::VerificationFailed {
                    reason: e.to_string(),
                });
                StatusCheck::ReadFailed(e)
            }
        }
    }

    async fn verify(&self, code: &DeviceCode) -> VerifyResult<DeviceIdentity> {
        match tokio::time::timeout(self.verify_timeout, self.verifier.verify(code)).await {
            Ok(result) => result,
            Err(_) => Err(VerificationError::Timeout),
        }
    }

    /// Publish a verification outcome unless a newer check has started
    async fn settle(
        &self,
        code: DeviceCode,
        generation: u64,
        result: &VerifyResult<DeviceIdentity>,
    ) -> Option<PairingEvent> {
        let mut state = self.state.lock().await;
        if state.generation != generation || state.current.as_ref() != Some(&code) {
            debug!(
                "Discarding superseded verification result for code {}",
                code.redacted()
            );
            return None;
        }

        let event = match result {
            Ok(device) => {
                info!("Device paired as {}", device);
                state.status = PairingStatus::Paired {
                    code: code.clone(),
                    device: device.clone(),
                };
                PairingEvent::Paired {
                    code,
                    device: device.clone(),
                }
            }
            Err(e) => {
                warn!("Device code {} failed verification: {}", code.redacted(), e);
                state.status = PairingStatus::Unpaired;
                PairingEvent::VerificationFailed {
                    reason: e.to_string(),
                }
            }
        };
        self.publish(&event);
        Some(event)
    }

    fn publish(&self, event: &PairingEvent) {
        // No subscribers is fine; the caller still gets the event back
        let _ = self.events.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::Notify;


    enum Script {
        Accept(&'static str),
        Reject(u16),
        /// Signal `entered`, then wait for `release` before accepting
        Gated {
            device: &'static str,
            entered: Arc<Notify>,
            release: Arc<Notify>,
        },
        /// Gated acceptance on the first call, rejection on later calls
        RevokedAfterFirst {
            device: &'static str,
            entered: Arc<Notify>,
            release: Arc<Notify>,
        },
    }

    #[derive(Default)]
    struct ScriptedVerifier {
        scripts: HashMap<String, Script>,
        calls: AtomicUsize,
    }

    impl ScriptedVerifier {
        fn with(mut self, code: &str, script: Script) -> Self {
            self.scripts.insert(code.to_string(), script);
            self
        }
    }

    #[async_trait]
    impl DeviceVerifier for ScriptedVerifier {
        async fn verify(&self, code: &DeviceCode) -> VerifyResult<DeviceIdentity> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.scripts.get(code.as_str()) {
                Some(Script::Accept(id)) => Ok(DeviceIdentity::new(*id)),
                Some(Script::Reject(status)) => Err(VerificationError::Rejected {
                    status: *status,
                    reason: "Unauthorized".into(),
                }),
                Some(Script::Gated {
                    device,
                    entered,
                    release,
                }) => {
                    entered.notify_one();
                    release.notified().await;
                    Ok(DeviceIdentity::new(*device))
                }
                Some(Script::RevokedAfterFirst {
                    device,
                    entered,
                    release,
                }) => {
                    if call == 0 {
                        entered.notify_one();
                        release.notified().await;
                        Ok(DeviceIdentity::new(*device))
                    } else {
                        Err(VerificationError::Rejected {
                            status: 401,
                            reason: "Unauthorized".into(),
                        })
                    }
                }
                None => Err(VerificationError::Remote("unknown code".into())),
            }
        }
    }

    fn code(s: &str) -> DeviceCode {
        DeviceCode::new(s).unwrap()
    }

    async fn controller_with(
        stored: Option<&str>,
        verifier: ScriptedVerifier,
    ) -> (PairingController<ScriptedVerifier>, TempDir) {
        let dir = tempdir().unwrap();
        let store = DeviceCodeStore::with_path(dir.path().join("deviceCode.txt"));
        if let Some(stored) = stored {
            store.write(&code(stored)).await.unwrap();
        }
        (PairingController::new(store, verifier), dir)
    }

    #[tokio::test]
    async fn test_empty_store_is_unpaired() {
        let (controller, _dir) = controller_with(None, ScriptedVerifier::default()).await;
        let mut events = controller.subscribe();

        let event = controller.get_status().await;

        assert_eq!(event, Some(PairingEvent::Unpaired));
        assert_eq!(events.recv().await.unwrap(), PairingEvent::Unpaired);
        assert_eq!(controller.status().await, PairingStatus::Unpaired);
        assert_eq!(controller.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_stored_code_is_paired() {
        let verifier = ScriptedVerifier::default().with("abc123", Script::Accept("dev-1"));
        let (controller, _dir) = controller_with(Some("abc123"), verifier).await;

        let event = controller.get_status().await.unwrap();

        match &event {
            PairingEvent::Paired { code, device } => {
                assert_eq!(code.as_str(), "abc123");
                assert_eq!(device.id, "dev-1");
            }
            other => panic!("expected paired, got {:?}", other),
        }
        assert_eq!(
            event.renderer_message(),
            RendererMessage::DeviceCode("abc123".into())
        );
        assert!(matches!(
            controller.status().await,
            PairingStatus::Paired { .. }
        ));
    }

    #[tokio::test]
    async fn test_rejected_code_fails_and_stays_on_disk() {
        let verifier = ScriptedVerifier::default().with("expired", Script::Reject(401));
        let (controller, _dir) = controller_with(Some("expired"), verifier).await;

        let event = controller.get_status().await.unwrap();

        assert!(matches!(event, PairingEvent::VerificationFailed { .. }));
        assert_eq!(
            event.renderer_message(),
            RendererMessage::DeviceCode(CODE_NOT_AVAILABLE.into())
        );
        assert_eq!(controller.status().await, PairingStatus::Unpaired);
        assert_eq!(controller.store().read().await.unwrap(), "expired");
    }

    #[tokio::test]
    async fn test_status_always_reverifies() {
        let verifier = ScriptedVerifier::default().with("abc123", Script::Accept("dev-1"));
        let (controller, _dir) = controller_with(Some("abc123"), verifier).await;

        for _ in 0..3 {
            assert!(controller.get_status().await.unwrap().is_paired());
        }
        assert_eq!(controller.verifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_callback_persists_and_verifies() {
        let verifier = ScriptedVerifier::default()
            .with("old", Script::Accept("dev-old"))
            .with("fresh", Script::Accept("dev-new"));
        let (controller, _dir) = controller_with(Some("old"), verifier).await;
        assert!(controller.get_status().await.unwrap().is_paired());

        let event = controller.on_pairing_callback(code("fresh")).await.unwrap();

        assert!(matches!(
            event,
            PairingEvent::Paired { ref device, .. } if device.id == "dev-new"
        ));
        assert_eq!(controller.store().read().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_callback_save_failure_is_distinct() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let store = DeviceCodeStore::with_path(blocker.join("deviceCode.txt"));
        let verifier = ScriptedVerifier::default().with("abc", Script::Accept("dev-1"));
        let controller = PairingController::new(store, verifier);

        let event = controller.on_pairing_callback(code("abc")).await.unwrap();

        assert!(matches!(event, PairingEvent::PairingSaveFailed { .. }));
        assert_eq!(controller.verifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.status().await, PairingStatus::Unpaired);
    }

    #[tokio::test]
    async fn test_stale_verification_does_not_overwrite_newer_result() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let verifier = ScriptedVerifier::default()
            .with(
                "oldcode",
                Script::Gated {
                    device: "dev-old",
                    entered: entered.clone(),
                    release: release.clone(),
                },
            )
            .with("newcode", Script::Accept("dev-new"));
        let (controller, _dir) = controller_with(Some("oldcode"), verifier).await;
        let controller = Arc::new(controller);
        let mut events = controller.subscribe();

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.get_status().await })
        };
        entered.notified().await;

        let fresh = controller.on_pairing_callback(code("newcode")).await.unwrap();
        assert!(matches!(
            fresh,
            PairingEvent::Paired { ref device, .. } if device.id == "dev-new"
        ));

        release.notify_one();
        assert_eq!(pending.await.unwrap(), None);

        assert_eq!(events.recv().await.unwrap(), fresh);
        assert!(events.try_recv().is_err());
        match controller.status().await {
            PairingStatus::Paired { device, .. } => assert_eq!(device.id, "dev-new"),
            other => panic!("expected paired with new code, got {:?}", other),
        }
        assert_eq!(controller.store().read().await.unwrap(), "newcode");
    }

    #[tokio::test]
    async fn test_older_check_of_same_code_does_not_overwrite_newer_result() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let verifier = ScriptedVerifier::default().with(
            "abc",
            Script::RevokedAfterFirst {
                device: "dev-1",
                entered: entered.clone(),
                release: release.clone(),
            },
        );
        let (controller, _dir) = controller_with(Some("abc"), verifier).await;
        let controller = Arc::new(controller);
        let mut events = controller.subscribe();

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.get_status().await })
        };
        entered.notified().await;

        let second = controller.get_status().await.unwrap();
        assert!(matches!(second, PairingEvent::VerificationFailed { .. }));

        release.notify_one();
        assert_eq!(first.await.unwrap(), None);

        assert_eq!(events.recv().await.unwrap(), second);
        assert!(events.try_recv().is_err());
        assert_eq!(controller.status().await, PairingStatus::Unpaired);
    }

    #[tokio::test]
    async fn test_verified_code_keeps_failure_cause() {
        let (controller, _dir) = controller_with(
            Some("revoked"),
            ScriptedVerifier::default().with("revoked", Script::Reject(401)),
        )
        .await;
        assert!(matches!(
            controller.verified_code().await,
            Err(PairingError::AuthenticationRequired)
        ));

        let (controller, _dir) = controller_with(
            Some("abc123"),
            ScriptedVerifier::default().with("abc123", Script::Reject(503)),
        )
        .await;
        match controller.verified_code().await {
            Err(PairingError::Unverified(VerificationError::Rejected { status, .. })) => {
                assert_eq!(status, 503)
            }
            other => panic!("expected unverified, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verification_timeout_fails() {
        let verifier = ScriptedVerifier::default().with(
            "slow",
            Script::Gated {
                device: "dev-slow",
                entered: Arc::new(Notify::new()),
                release: Arc::new(Notify::new()),
            },
        );
        let (controller, _dir) = controller_with(Some("slow"), verifier).await;
        let controller = controller.with_verify_timeout(Duration::from_millis(50));

        let event = controller.get_status().await.unwrap();
        match event {
            PairingEvent::VerificationFailed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected timeout failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verified_code_requires_pairing() {
        let (controller, _dir) = controller_with(None, ScriptedVerifier::default()).await;
        assert!(matches!(
            controller.verified_code().await,
            Err(PairingError::AuthenticationRequired)
        ));

        let (controller, _dir) = controller_with(
            Some("abc123"),
            ScriptedVerifier::default().with("abc123", Script::Accept("dev-1")),
        )
        .await;
        assert_eq!(controller.verified_code().await.unwrap().as_str(), "abc123");
    }
}
