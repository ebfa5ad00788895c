//! Portal-specific knowledge.
//!
//! - [`endpoints`] - ordered, versionable endpoint variant lists
//! - [`parser`] - narrow regex extraction over portal markup
//! - [`dates`] - the portal's date formats, including `/Date(ms)/`

pub mod dates;
pub mod endpoints;
pub mod parser;

pub use endpoints::EndpointCatalog;
