//! ScreenLink Auth - Device pairing and authentication
//!
//! Links a desktop installation to a ScreenLink account through a device
//! code issued by the remote service.
//!
//! # Pairing Flow
//!
//! 1. The app opens the enrollment page (`enroll::new_device_url`)
//! 2. The user signs in; the service opens `screenlinkDesktop://deviceCode=<token>`
//! 3. `parse_callback_url` extracts the token and
//!    `PairingController::on_pairing_callback` persists and verifies it
//! 4. On later runs `PairingController::get_status` re-verifies the stored code
//! 5. Authenticated requests use the code as a bearer token
//!
//! # Example
//!
//! ```no_run
//! use screenlink_auth::{parse_callback_url, DeviceCodeStore, HttpVerifier, PairingController};
//! use screenlink_core::Config;
//!
//! async fn example() {
//!     let config = Config::default();
//!     let store = DeviceCodeStore::from_config(&config).unwrap();
//!     let verifier = HttpVerifier::new(&config).unwrap();
//!     let controller = PairingController::new(store, verifier);
//!
//!     let code = parse_callback_url("screenlinkDesktop://deviceCode=abc123", &config.url_scheme)
//!         .unwrap();
//!     if let Some(event) = controller.on_pairing_callback(code).await {
//!         println!("Pairing outcome: {:?}", event);
//!     }
//! }
//! ```

pub mod callback;
pub mod device;
pub mod enroll;
pub mod pairing;
pub mod storage;
pub mod verifier;

pub use callback::{parse_callback_url, CallbackError};
pub use device::{DeviceCode, DeviceIdentity};
pub use enroll::{new_device_url, DeviceDescription};
pub use pairing::{
    PairingController, PairingError, PairingEvent, PairingResult, PairingStatus,
    CODE_NOT_AVAILABLE, DEFAULT_VERIFY_TIMEOUT,
};
pub use storage::{DeviceCodeStore, StorageError, StorageResult};
pub use verifier::{DeviceVerifier, HttpVerifier, VerificationError, VerifyResult};
