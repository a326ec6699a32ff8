mod errors;
mod responses;

pub use errors::*;
pub use responses::*;
