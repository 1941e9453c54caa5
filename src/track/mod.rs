mod backend;
mod key;
mod pending;
mod ports;
mod srv;
mod tcp;

pub use backend::{BackendTable, ReportRow};
pub use pending::{PendingQuery, PendingQueryTable, QUERY_EXPIRY_SECS};
pub use ports::{PortSet, PORT_SET_CAPACITY};
pub use srv::{SrvTarget, SrvTargetTable};
pub use tcp::TcpConnTracker;
