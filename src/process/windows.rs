//! Windows non-blocking pipe reads via `PeekNamedPipe` + `ReadFile`, using
//! `windows-sys`: peek the pipe's buffered byte count first, then read
//! only that many bytes so the call never blocks.

use std::io;
use std::os::windows::io::AsRawHandle;

use windows_sys::Win32::Storage::FileSystem::ReadFile;
use windows_sys::Win32::System::Pipes::PeekNamedPipe;

use super::ReadStatus;

/// No-op on Windows: `PeekNamedPipe` already lets us avoid blocking
/// without changing the handle's mode. Used for both the stdout and
/// stderr pipes.
pub fn set_nonblocking<H>(_handle: &H) -> io::Result<()> {
    Ok(())
}

pub fn read_available<H: AsRawHandle>(source: &mut H, buf: &mut Vec<u8>) -> io::Result<ReadStatus> {
    let handle = source.as_raw_handle() as windows_sys::Win32::Foundation::HANDLE;
    let mut available: u32 = 0;
    // SAFETY: `handle` is a valid, open pipe handle for the lifetime of
    // this call; the out-pointers are valid stack locations.
    let ok = unsafe {
        PeekNamedPipe(
            handle,
            std::ptr::null_mut(),
            0,
            std::ptr::null_mut(),
            &mut available,
            std::ptr::null_mut(),
        )
    };
    if ok == 0 {
        // Broken pipe (child exited) reads as an error from PeekNamedPipe.
        return Ok(ReadStatus::Eof);
    }
    if available == 0 {
        return Ok(ReadStatus::WouldBlock);
    }

    let mut chunk = vec![0u8; available as usize];
    let mut read: u32 = 0;
    // SAFETY: `chunk` has `available` valid bytes to write into; `handle`
    // is the same valid handle peeked above.
    let ok = unsafe {
        ReadFile(
            handle,
            chunk.as_mut_ptr(),
            chunk.len() as u32,
            &mut read,
            std::ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Ok(ReadStatus::Eof);
    }
    chunk.truncate(read as usize);
    buf.extend_from_slice(&chunk);
    if read == 0 {
        Ok(ReadStatus::Eof)
    } else {
        Ok(ReadStatus::Data(read as usize))
    }
}
