pub mod error;
pub mod ratelimit;
pub mod service;
pub mod template;
pub mod transport;

pub use error::CommunicatorError;
pub use ratelimit::RateLimiter;
pub use service::{Communicator, DispatchOutcome, DispatchRequest};
pub use template::{InMemoryTemplateRegistry, Template, TemplateRegistry};
pub use transport::{LoggingTransport, NotificationTransport};
