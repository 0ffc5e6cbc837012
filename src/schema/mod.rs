pub mod attachment;
pub mod delivery;
pub mod envelope;

pub use attachment::*;
pub use delivery::*;
pub use envelope::*;
