//! FIFO accumulation of raw capture bytes into fixed-size frames.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pending: VecDeque<u8>,
    frame: Vec<u8>,
    frame_bytes: usize,
}

impl FrameBuffer {
    pub fn new(frame_bytes: usize) -> Self {
        let frame_bytes = frame_bytes.max(1);
        Self {
            pending: VecDeque::with_capacity(frame_bytes * 2),
            frame: Vec::with_capacity(frame_bytes),
            frame_bytes,
        }
    }

    /// Bytes buffered but not yet handed out as a frame.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Append `incoming` (may be empty) and slice one frame off the front if
    /// enough bytes are buffered. The returned slice is valid until the next call.
    pub fn pull(&mut self, incoming: &[u8]) -> Option<&[u8]> {
        self.pending.extend(incoming);
        if self.pending.len() < self.frame_bytes {
            return None;
        }

        self.frame.clear();
        self.frame.extend(self.pending.drain(..self.frame_bytes));
        Some(&self.frame)
    }

    /// Drop everything still buffered, returning how many bytes were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.frame.clear();
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_partial_frames_until_complete() {
        let mut buffer = FrameBuffer::new(4);
        assert!(buffer.pull(&[1, 2, 3]).is_none());
        assert_eq!(buffer.len(), 3);
        assert!(buffer.pull(&[]).is_none());
        assert_eq!(buffer.len(), 3);

        assert_eq!(buffer.pull(&[4, 5]), Some(&[1, 2, 3, 4][..]));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn yields_one_frame_per_pull() {
        let mut buffer = FrameBuffer::new(2);
        assert_eq!(buffer.pull(&[1, 2, 3, 4, 5]), Some(&[1, 2][..]));
        assert_eq!(buffer.pull(&[]), Some(&[3, 4][..]));
        assert!(buffer.pull(&[]).is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn never_loses_or_reorders_bytes() {
        let input: Vec<u8> = (0..=255u8).cycle().take(5_000).collect();
        let mut buffer = FrameBuffer::new(512);
        let mut output = Vec::new();

        // Irregular chunking, as a pipe would deliver it.
        let mut offset = 0;
        let mut step = 1;
        while offset < input.len() {
            let end = (offset + step).min(input.len());
            let mut chunk = &input[offset..end];
            while let Some(frame) = buffer.pull(std::mem::take(&mut chunk)) {
                assert_eq!(frame.len(), 512);
                output.extend_from_slice(frame);
            }
            offset = end;
            step = (step * 7 + 3) % 900 + 1;
        }

        assert_eq!(buffer.len(), input.len() % 512);
        output.extend(buffer.pending.iter().copied());
        assert_eq!(output, input);
    }

    #[test]
    fn clear_discards_remainder() {
        let mut buffer = FrameBuffer::new(8);
        let _ = buffer.pull(&[0; 5]);
        assert_eq!(buffer.clear(), 5);
        assert_eq!(buffer.len(), 0);
    }
}
