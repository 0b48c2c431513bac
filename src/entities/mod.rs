pub mod company;
pub mod order;
pub mod order_line_item;
pub mod serial_counter;
