pub mod item;
pub mod item_instance;
pub mod office;
pub mod office_inventory;
pub mod office_transaction;
pub mod purchase;
pub mod purchase_line;
pub mod transfer;
pub mod transfer_instance;
