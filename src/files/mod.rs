pub mod range;
pub mod stream;
pub mod upload;

pub use range::ByteRange;
pub use upload::StoredFile;
