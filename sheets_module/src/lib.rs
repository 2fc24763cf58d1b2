pub mod google_auth;
pub mod sheets;

pub use google_auth::{GoogleAuth, GoogleAuthConfig, GoogleAuthError, GOOGLE_SHEETS_SCOPES};
pub use sheets::{a1_range, column_letter, SheetProperties, SheetsClient, SheetsError};
