pub mod adapter;
pub mod aggregate;
pub mod assemble;
pub mod breaker;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod extract;
pub mod http;
pub mod parser;
pub mod prompt;
pub mod template;

pub mod test_support;

pub use adapter::{HttpProvider, Provider};
pub use aggregate::{aggregate, Consensus};
pub use assemble::assemble;
pub use breaker::CircuitBreaker;
pub use dispatch::dispatch_all;
pub use engine::{ConsensusEngine, EngineOutcome};
pub use error::{EngineError, ProviderError};
pub use http::{HttpTransport, Transport};
