use router_api::ObjectKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Proxy {0} has no usable host IP for a next hop")]
    MissingNextHop(ObjectKey),
}

impl From<TableError> for router_core::CoreError {
    fn from(err: TableError) -> Self {
        router_core::CoreError::RouteStore(err.to_string())
    }
}
