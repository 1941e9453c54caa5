pub mod decoder;
mod name;
pub mod types;

pub use decoder::{process_message, DnsTables, PacketMeta, DNS_PORT};
pub use name::decode_name;
