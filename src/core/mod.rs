pub mod auth_gate;
pub mod fingerprint;
pub mod proxy;
pub mod registry;
pub mod response_cache;
pub mod token_verifier;

pub use auth_gate::{AuthDecision, AuthGate};
pub use fingerprint::TokenFingerprint;
pub use proxy::{InboundRequest, ProxyError, ProxyResponse, RerouteProxy};
pub use registry::{RegistryError, ServicesRegistry};
pub use response_cache::{CacheOutcome, CachedPayload, ResponseCache};
pub use token_verifier::{TokenVerifier, Verification, VerifyError};
