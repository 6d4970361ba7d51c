pub mod moka;
pub mod traits;

pub use self::moka::MokaResolutionCache;
pub use traits::ResolutionCache;
