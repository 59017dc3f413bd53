mod common;

mod column_operations;
mod move_range;
mod queued_writes;
mod row_operations;
mod sheet_management;
mod volatile;
