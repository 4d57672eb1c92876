pub mod instruction_selection;
pub mod lower;
pub mod resolve;
