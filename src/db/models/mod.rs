pub mod group;
pub mod word;

pub use group::Group;
pub use word::{GroupFilter, NewWord, Word};
