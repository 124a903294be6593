mod decoder;
mod encoder;
mod lexer;
mod value;

pub use decoder::decode;
pub use encoder::{encode, encode_string};
pub use value::{JsonStr, Object, Value};
