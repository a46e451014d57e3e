//! HTTP boundary helpers for axum hosts.

mod cookies;
mod flash;
mod navigation;
mod response;

pub use cookies::{attach_session_cookie, clear_session_cookie, parse_cookie, session_cookie, session_from_headers};
pub use flash::{flash, flash_redirect, FlashBag, ERRORS_KEY, FLASH_KEY, OLD_INPUT_KEY};
pub use navigation::{back_url, previous_url, track_previous, RequestInfo};
pub use response::{logout_response, redirect_back, see_other};
