//! Operator-facing providers: QR delivery and login credential input
//!
//! **QR delivery**: a failed delivery is logged and the login attempt still waits
//! for the scan, since the operator may read the code from another surface.
//!
//! **Credential input**: login never reads the terminal directly. The binary wires
//! a terminal prompt; services can pre-supply secrets or answer via a callback.

mod input;
mod sink;
mod telegram;

pub use input::{CallbackInput, CredentialInput, InputError, InputRequest, PresetInput};
pub use sink::{DeliveryError, QrRenderer, QrSink};
pub use telegram::TelegramPhotoSink;
