//! HistData.com ASCII 1-minute bar downloads.
//!
//! The site hides each monthly ZIP behind an HTML form carrying a one-time
//! token. A download is a GET of the month's page, followed by a POST of the
//! form's hidden fields from the same cookie session.

pub mod form;
pub mod provider;

pub use form::{DownloadForm, FORM_ID, REQUIRED_FIELDS, parse_download_form};
pub use provider::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, HistDataProvider, HistDataSettings};
