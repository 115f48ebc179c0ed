pub mod codecli;

pub use codecli::CodeCliProvider;
