pub mod answers;
pub mod meta;
pub mod numbers;
pub mod pha;
