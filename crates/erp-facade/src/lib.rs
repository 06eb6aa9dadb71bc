pub mod adapter;
pub mod error;
pub mod facade;
pub mod http_adapter;

pub use adapter::{
    Application, AuthMode, ConnectionStatus, ErpAdapter, FetchOutcome, InvoiceApplication,
    PostOutcome,
};
pub use error::ErpError;
pub use facade::ErpFacade;
pub use http_adapter::HttpErpAdapter;
