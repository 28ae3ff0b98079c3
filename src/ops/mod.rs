pub mod command;
pub mod navigation;
pub mod schedule;
pub mod stack;
