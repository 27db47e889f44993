pub mod device;
pub mod error;
pub mod test_utils;

pub use device::{BlockDevice, FileDevice};
pub use error::FathomError;
