pub mod error;
pub mod models;
pub mod value;

pub use error::*;
pub use models::*;
pub use value::*;
