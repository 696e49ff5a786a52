pub mod compatible;
pub mod traits;
pub mod types;

pub use compatible::{CompatibleProvider, build_provider_client};
pub use traits::Provider;
pub use types::ProviderResponse;
