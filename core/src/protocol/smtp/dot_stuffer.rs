/*
 * dot_stuffer.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Transparency for SMTP DATA (RFC 5321 section 4.5.2). A composed message is sent as is,
//! except that a `.` opening any line is doubled so the server never mistakes it for the
//! end of data, and the `.CRLF` terminator follows a final CRLF.

#[derive(Clone, Copy, PartialEq, Eq)]
enum LinePos {
    /// Next byte opens a line; true at the start of the message.
    Start,
    Middle,
    AfterCr,
}

/// Line-start tracking that survives being fed a message in several pieces.
pub struct DotStuffer {
    pos: LinePos,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self { pos: LinePos::Start }
    }
}

impl DotStuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `piece` to `out`, doubling each line-leading dot.
    pub fn push(&mut self, piece: &[u8], out: &mut Vec<u8>) {
        for &b in piece {
            if b == b'.' && self.pos == LinePos::Start {
                out.push(b'.');
            }
            out.push(b);
            self.pos = match (self.pos, b) {
                (_, b'\n') => LinePos::Start,
                (_, b'\r') => LinePos::AfterCr,
                _ => LinePos::Middle,
            };
        }
    }

    /// Terminate the last line if needed and write `.CRLF`.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        match self.pos {
            LinePos::Start => {}
            LinePos::AfterCr => out.push(b'\n'),
            LinePos::Middle => out.extend_from_slice(b"\r\n"),
        }
        out.extend_from_slice(b".\r\n");
        self.pos = LinePos::Start;
    }
}

/// DATA payload for a whole RFC 822 message, terminator included.
pub fn stuff_message(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    let mut stuffer = DotStuffer::new();
    stuffer.push(message, &mut out);
    stuffer.finish(&mut out);
    out
}
