// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTY input injection (§4.7 step 6): open the TTY read-write-nocontrol, push
//! the payload character-by-character into the input queue via `TIOCSTI`,
//! append a trailing newline.

use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;

use nix::libc;

/// `O_NOCTTY` so opening the target TTY never makes it our controlling
/// terminal (§4.7: "open the TTY read-write-nocontrol").
const O_NOCTTY: i32 = libc::O_NOCTTY;

/// Push `text` followed by a newline into `/dev/<tty>`'s input queue via
/// `TIOCSTI`, one character at a time as the spec requires.
pub fn inject(tty: &str, text: &str) -> bool {
    let path = format!("/dev/{tty}");
    let Ok(file) = OpenOptions::new().read(true).write(true).custom_flags(O_NOCTTY).open(&path) else {
        return false;
    };
    let fd = file.as_raw_fd();

    for byte in text.bytes().chain(std::iter::once(b'\n')) {
        if !push_char(fd, byte) {
            return false;
        }
    }
    true
}

// TIOCSTI writes a byte into another process's TTY input queue; the raw
// ioctl call is unsafe because it takes a pointer to the byte argument.
#[allow(unsafe_code)]
fn push_char(fd: i32, byte: u8) -> bool {
    let ch = byte as libc::c_char;
    // SAFETY: `fd` is a valid, open file descriptor owned by the caller for
    // the duration of this call; `&ch` points to a single live stack byte
    // matching what TIOCSTI expects.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCSTI, &ch as *const libc::c_char) };
    rc == 0
}

#[cfg(test)]
#[path = "tty_input_tests.rs"]
mod tests;
