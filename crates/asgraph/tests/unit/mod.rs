//! Black-box unit tests for the asgraph public API.

mod edge_model_test;
mod filter_test;
mod preorder_test;
mod property_test;
mod similarity_test;
mod strtable_test;
