// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// Chat stream decoding
//
// Responsibilities:
// - Cut the incoming SSE text stream into frames at blank lines,
//   independent of network chunking
// - Parse `event:` / `data:` lines of each frame
// - Classify payloads into text, visual, metadata and error events
// - Degrade non-JSON payloads to plain text instead of failing
//
// Everything here is synchronous and free of I/O; the transport drives it.

mod classifier;
mod decoder;
mod types;

pub use classifier::{classify, classify_frame, parse_frame, DEFAULT_EVENT_TYPE};
pub use decoder::{FrameDecoder, FRAME_DELIMITER};
pub use types::{MetadataUpdate, Payload, RawFrame, StreamEvent, StreamProtocolError};
