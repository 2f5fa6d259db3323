// Re-export all model types
pub use self::category::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::events::*;
pub use self::order::*;
pub use self::product::*;
pub use self::user::*;
pub use self::validation::*;
pub use self::webhook::*;

mod category;
mod enums;
mod errors;
mod events;
mod order;
mod product;
mod user;
mod validation;
mod webhook;
