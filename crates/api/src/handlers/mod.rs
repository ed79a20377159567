pub mod calls;
pub mod mango;
