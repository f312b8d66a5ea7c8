//! Document operations
//!
//! - `DocumentBuilder`: index / create / update / upsert / get / delete / exists
//! - `MGetBuilder`: fetch many documents by id
//! - `ObjectBuilder`: nested payload construction shared with bulk

mod builder;
mod mget;
mod object;
mod response;

pub use builder::{DocumentBuilder, Refresh};
pub use mget::MGetBuilder;
pub use object::ObjectBuilder;
pub use response::{DocumentResponse, GetResponse, MGetResponse};

pub(crate) use object::object_fields;
