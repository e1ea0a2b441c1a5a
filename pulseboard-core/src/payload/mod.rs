mod mapping;
mod normalizer;
mod profile;

pub use mapping::FieldMapping;
pub use normalizer::{parse_timestamp, NormalizedPayload, Normalizer};
pub use profile::{EndpointKind, EndpointProfile, ResponseMode};
