pub mod data_core;
pub mod document;
pub mod lazy_tree;
