pub mod record;
pub mod registry;

pub use record::BirthdayRecord;
pub use registry::Registry;
