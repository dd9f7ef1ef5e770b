//! External-IP route table handed to the BGP speaker
pub mod announcement;
pub mod error;
pub mod table;

pub use announcement::Announcement;
pub use error::TableError;
pub use table::ExternalIpRouteTable;
