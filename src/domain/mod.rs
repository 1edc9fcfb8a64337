pub mod models;
pub mod errors;
pub mod feedback;
pub mod normalize;
pub mod names;
pub mod directory;
pub mod rates;

pub use models::*;
pub use errors::*;
pub use feedback::*;
pub use normalize::*;
pub use names::*;
pub use directory::*;
pub use rates::*;
