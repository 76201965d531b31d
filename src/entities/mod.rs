//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.
//!
//! Rows reference each other by id only. Owning relations (order → items, cart → items)
//! cascade on delete; plain references (item → product) do not.

pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod payment;
pub mod product;
pub mod user;

// Re-export specific types to avoid conflicts
pub use cart::{Column as CartColumn, Entity as Cart, Model as CartModel};
pub use cart_item::{Column as CartItemColumn, Entity as CartItem, Model as CartItemModel};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use order_status_history::{
    Column as OrderStatusHistoryColumn, Entity as OrderStatusHistory,
    Model as OrderStatusHistoryModel,
};
pub use payment::{
    Column as PaymentColumn, Entity as Payment, Model as PaymentModel, PaymentMethod,
    PaymentStatus,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
