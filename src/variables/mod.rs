//! Node payload types for plain values

mod value;


pub use value::Value;
