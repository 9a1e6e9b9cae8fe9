mod connection;
mod inprocess;

pub use connection::{
    Acceptor, Connection, ConnectionStatistics, ConnectionTypeId, IN_PROCESS_CONNECTION_TYPE_ID,
    MIN_CONNECTION_DATA_SIZE,
};
pub use inprocess::{InProcessAcceptor, InProcessConnection, InProcessRegistry};
