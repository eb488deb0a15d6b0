// Internal utilities shared by the codec, encryption and schema modules

pub mod error;
