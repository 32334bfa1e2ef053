pub mod tree;


pub use tree::{DocumentStore, IntegrityIssue};
