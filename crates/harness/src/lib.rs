pub mod guild;
pub mod sink;

pub use guild::{MEMBERS, TestGuild, member, officer, start_time};
pub use sink::RecordingSink;
