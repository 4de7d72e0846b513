//! Request/response types shared by the HTTP surface and the mobile client.

mod requests;
mod responses;

pub use requests::*;
pub use responses::*;
