/// Groups record lines into size-bounded batches.
///
/// A batch is closed before the line that would push it past the threshold,
/// so lines are never split and a batch only exceeds the threshold when a
/// single line is larger than the threshold on its own.
#[derive(Debug)]
pub struct Batcher {
    threshold: usize,
    buffer: Vec<u8>,
}

impl Batcher {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            buffer: Vec::new(),
        }
    }

    /// Adds one line (without its newline). Returns the completed batch when
    /// the line didn't fit into the current one.
    pub fn push(&mut self, line: &[u8]) -> Option<Vec<u8>> {
        let completed = if !self.buffer.is_empty()
            && self.buffer.len() + line.len() + 1 > self.threshold
        {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        };

        self.buffer.extend_from_slice(line);
        self.buffer.push(b'\n');
        completed
    }

    /// Returns whatever is left once the input is exhausted
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}
