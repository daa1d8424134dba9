//! API endpoints. One module per endpoint, each owning its handler and
//! error type; wire types live in `common::protocol` so the client speaks
//! the same structs.

pub mod admin;
pub mod attachments;
pub mod auth_new;
pub mod changes;
pub mod docs;
pub mod status;

mod params;

pub(crate) use params::{FeedQuery, ParamError, VaultQuery};
