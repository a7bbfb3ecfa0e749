pub mod cart;
pub mod order_lines;
pub mod products;
pub mod supplier_requests;
pub mod system;
