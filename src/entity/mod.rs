pub mod audit_logs;
pub mod cart_items;
pub mod categories;
pub mod groups;
pub mod menu_items;
pub mod order_items;
pub mod orders;
pub mod user_groups;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use groups::Entity as Groups;
pub use menu_items::Entity as MenuItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use user_groups::Entity as UserGroups;
pub use users::Entity as Users;
