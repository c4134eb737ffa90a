pub mod address;
pub mod cart_item;
pub mod order;
pub mod product;
pub mod user;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{Entity as Order, Model as OrderModel, PaymentStatus, PaymentType, ProductSnapshot};
pub use product::{Entity as Product, Model as ProductModel};
pub use user::{Entity as User, IdList, Model as UserModel};
