//! POSIX non-blocking pipe reads, via `rustix` for the `fcntl`/`O_NONBLOCK`
//! syscalls.

use std::io::{self, Read};
use std::os::fd::AsFd;

use rustix::fs::{fcntl_getfl, fcntl_setfl, OFlags};

use super::ReadStatus;

/// Puts a pipe handle's file descriptor into non-blocking mode. Once set,
/// reads against it return `WouldBlock` instead of blocking when no data
/// is ready. Used for both the stdout and stderr pipes.
pub fn set_nonblocking<H: AsFd>(handle: &H) -> io::Result<()> {
    let fd = handle.as_fd();
    let flags = fcntl_getfl(fd).map_err(io::Error::from)?;
    fcntl_setfl(fd, flags | OFlags::NONBLOCK).map_err(io::Error::from)?;
    Ok(())
}

/// Reads whatever bytes are currently available without blocking,
/// appending them to `buf`. Never blocks the caller's polling loop.
pub fn read_available<R: Read>(source: &mut R, buf: &mut Vec<u8>) -> io::Result<ReadStatus> {
    let mut total = 0;
    let mut chunk = [0u8; 4096];
    loop {
        match source.read(&mut chunk) {
            Ok(0) => return Ok(ReadStatus::Eof),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                total += n;
                if n < chunk.len() {
                    // Drained the kernel buffer for now.
                    return Ok(ReadStatus::Data(total));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Ok(if total == 0 {
                    ReadStatus::WouldBlock
                } else {
                    ReadStatus::Data(total)
                });
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
