//! Authentication: identity-provider client, session persistence, and the
//! auth state machine.

pub mod callback;
pub mod client;
pub mod error;
pub mod jwt;
pub mod session;
pub mod state;
pub mod validate;

pub use callback::{complete_oauth_callback, parse_callback_url};
pub use client::{AuthClient, SignupOutcome, TokenSet};
pub use error::{AuthError, CallbackError, ConfirmError, SignupError, StoreError};
pub use session::{CredentialSet, SessionStore};
pub use state::{AuthController, AuthEvent, AuthState, AuthStatus, reduce};
