// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Frame decoder
//
// Accumulates network chunks and cuts them into complete frames at the
// blank-line delimiter. Output is independent of where chunk boundaries
// fall, including a delimiter or a multi-byte character split across
// two chunks.

/// Separator between frames on the wire.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Stateful splitter from arbitrary chunks to complete frame strings.
///
/// The decoder has no error states: any text is valid framing, and
/// judging a frame's contents is the classifier's job.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Text received but not yet terminated by a delimiter.
    buffer: String,
    /// Tail bytes of an incomplete UTF-8 sequence from the last byte chunk.
    pending_bytes: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text chunk and return every frame it completed, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        // The buffer holds no complete delimiter, so a new one can start
        // at the buffer's last character at the earliest.
        let mut scan_from = self.buffer.len().saturating_sub(FRAME_DELIMITER.len() - 1);
        while !self.buffer.is_char_boundary(scan_from) {
            scan_from -= 1;
        }
        self.buffer.push_str(chunk);
        self.drain_frames(scan_from)
    }

    /// Append a raw byte chunk.
    ///
    /// An incomplete UTF-8 sequence at the end of the chunk is held back
    /// until the next chunk completes it. Invalid sequences decode to
    /// U+FFFD.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = take_decodable(&mut self.pending_bytes);
        self.feed(&text)
    }

    /// Emit whatever is left once the transport reports end-of-stream.
    ///
    /// The last frame may legally omit its trailing delimiter.
    pub fn flush(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let rest = std::mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Bytes buffered but not yet emitted as a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.pending_bytes.len()
    }

    fn drain_frames(&mut self, scan_from: usize) -> Vec<String> {
        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut search = scan_from;
        while let Some(pos) = self.buffer[search..].find(FRAME_DELIMITER) {
            let end = search + pos;
            frames.push(self.buffer[consumed..end].to_string());
            consumed = end + FRAME_DELIMITER.len();
            search = consumed;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        frames
    }
}

/// Decode the longest prefix of `pending` that is complete UTF-8, leaving
/// an unfinished trailing sequence in place.
fn take_decodable(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        let (valid_up_to, invalid_len) = match std::str::from_utf8(pending) {
            Ok(_) => (pending.len(), None),
            Err(err) => (err.valid_up_to(), err.error_len()),
        };
        out.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
        match invalid_len {
            None => {
                pending.drain(..valid_up_to);
                return out;
            }
            Some(len) => {
                out.push(char::REPLACEMENT_CHARACTER);
                pending.drain(..valid_up_to + len);
            }
        }
    }
}
