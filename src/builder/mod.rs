mod program;
mod session;
mod value;

pub use program::Program;
pub use session::Builder;
pub use value::Value;
