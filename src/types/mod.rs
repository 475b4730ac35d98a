mod value;

pub use value::{FileHandle, FileList, Value};
