pub mod order;
pub mod order_item;
pub mod product;
pub mod product_size;
pub mod review;
pub mod user;
pub mod wishlist_item;
