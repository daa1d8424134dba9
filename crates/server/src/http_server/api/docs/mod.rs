//! Document endpoints: fetch, conflict-checked put, soft delete, and the
//! bulk upsert that merges on the server when a base is supplied.

pub mod bulk;
pub mod delete_doc;
pub mod get_doc;
pub mod put;
