use std::io::{self, BufRead};

/// One newline-terminated frame from the underlying stream.
#[derive(Debug)]
pub(crate) enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    TooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    Io {
        line_number: usize,
        kind: io::ErrorKind,
    },
}

/// Splits a byte stream on `\n` without ever buffering more than `max_line_bytes` of one line.
///
/// Oversized lines are drained and reported as [`BoundedLine::TooLong`]; reading resumes at the
/// next line. The first I/O error ends iteration.
pub(crate) struct BoundedLineReader<R: BufRead> {
    reader: R,
    max_line_bytes: usize,
    current: Vec<u8>,
    observed_bytes: usize,
    overflowed: bool,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> BoundedLineReader<R> {
    pub(crate) fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            current: Vec::new(),
            observed_bytes: 0,
            overflowed: false,
            line_number: 0,
            done: false,
        }
    }

    fn finish_line(&mut self) -> BoundedLine {
        self.line_number += 1;
        let line_number = self.line_number;
        let observed_bytes = std::mem::take(&mut self.observed_bytes);

        if std::mem::take(&mut self.overflowed) {
            self.current.clear();
            return BoundedLine::TooLong {
                line_number,
                observed_bytes,
                max_line_bytes: self.max_line_bytes,
            };
        }

        BoundedLine::Line {
            line_number,
            bytes: std::mem::take(&mut self.current),
        }
    }

    fn trailing_line(&mut self) -> Option<BoundedLine> {
        if self.overflowed || !self.current.is_empty() {
            Some(self.finish_line())
        } else {
            None
        }
    }
}

impl<R: BufRead> Iterator for BoundedLineReader<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let (consumed, complete) = match self.reader.fill_buf() {
                Ok([]) => {
                    self.done = true;
                    return self.trailing_line();
                }
                Ok(chunk) => {
                    let newline = chunk.iter().position(|b| *b == b'\n');
                    let segment = &chunk[..newline.unwrap_or(chunk.len())];

                    self.observed_bytes = self.observed_bytes.saturating_add(segment.len());
                    if self.observed_bytes > self.max_line_bytes {
                        self.overflowed = true;
                        self.current.clear();
                    } else {
                        self.current.extend_from_slice(segment);
                    }

                    match newline {
                        Some(idx) => (idx + 1, true),
                        None => (chunk.len(), false),
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    self.line_number += 1;
                    return Some(BoundedLine::Io {
                        line_number: self.line_number,
                        kind: err.kind(),
                    });
                }
            };

            self.reader.consume(consumed);
            if complete {
                return Some(self.finish_line());
            }
        }
    }
}
