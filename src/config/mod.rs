pub mod access;
pub mod settings;

pub use access::*;
pub use settings::*;
