mod error;
mod lttb;
mod record;
mod reporters;
mod sample;
mod trend;

pub use error::*;
pub use lttb::*;
pub use record::*;
pub use reporters::*;
pub use sample::*;
pub use trend::*;
