mod sync;

pub(crate) use sync::{BoundedLine, BoundedLineReader};
