mod deserializer;
mod serializer;

pub use deserializer::{Deserializer, SliceDeserializer};
pub use serializer::{DynamicSerializer, Serializer};
