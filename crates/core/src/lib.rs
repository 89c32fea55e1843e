pub mod account;
pub mod clock;
pub mod error;
pub mod fields;
pub mod ids;
pub mod schema;
pub mod table;
pub mod text;

pub use account::{Account, RolePolicy};
pub use clock::{Clock, ManualClock, ZonedClock};
pub use error::CoreError;
pub use fields::{FieldKind, FieldUpdates, SkillField};
pub use ids::*;
pub use schema::{Header, MemberColumns, SlotColumns};
pub use table::{Record, SheetValues, Table};
