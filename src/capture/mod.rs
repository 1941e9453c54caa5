mod frame;
mod reader;

pub use frame::{decode_frame, Segment};
pub use reader::{Record, SnoopReader};
