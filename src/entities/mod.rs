//! sea-orm entities, one module per table.

pub mod asset;
pub mod asset_checkout;
pub mod category;
pub mod department;
pub mod employee;
pub mod site;
pub mod so_asset_entry;
pub mod so_session;
pub mod user;

pub use asset::AssetStatus;
pub use asset_checkout::CheckoutStatus;
pub use so_session::SessionStatus;
pub use user::UserRole;
