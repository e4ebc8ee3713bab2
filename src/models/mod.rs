mod brand;
mod category;
mod order;
mod order_item;
mod product;
mod review;
mod user;

pub use brand::*;
pub use category::*;
pub use order::*;
pub use order_item::*;
pub use product::*;
pub use review::*;
pub use user::*;
