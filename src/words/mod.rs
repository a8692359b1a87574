mod parser;

pub use parser::{parse_word_list, ENTRY_SEPARATORS};
