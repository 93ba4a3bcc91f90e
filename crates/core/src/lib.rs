pub mod config;
pub mod errors;
pub mod state;
pub mod token;
pub mod urls;

pub use errors::{InteractionError, GENERIC_FAILURE_MESSAGE};
pub use state::ApplicationState;
pub use token::{TokenError, TokenSigner};
pub use urls::extract_url;
