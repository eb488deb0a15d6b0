// Codec module: the type-directed serialize/deserialize pair

pub mod decode;
pub mod encode;
pub mod envelope;
pub mod types;
