pub mod results;

pub use results::ResultStore;
