mod reader;
mod writer;

pub use reader::{read_musicxml, Score};
pub use writer::ScoreWriter;
