pub mod controls;
pub mod funnel;
pub mod multi_select;
pub mod radio_block;
