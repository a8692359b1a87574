mod groups;
mod words;
