use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::StreamTransport;

/// A character device (serial port, radio modem, pty) opened for read/write.
///
/// Line settings (baud rate, parity, flow control) are the caller's business;
/// the device is expected to be configured before it is opened here.
pub struct SerialDevice {
    file: File,
    path: PathBuf,
    drain: Drain,
}

/// How `flush` waits for written bytes to leave the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Terminal line: `tcdrain` until the output queue is transmitted.
    Terminal,
    /// Regular capture file: `fdatasync`.
    File,
    /// Pipes and other character devices: the write already reached the driver.
    Immediate,
}

impl Drain {
    fn for_file(file: &File) -> io::Result<Self> {
        if file.is_terminal() {
            Ok(Self::Terminal)
        } else if file.metadata()?.is_file() {
            Ok(Self::File)
        } else {
            Ok(Self::Immediate)
        }
    }
}

impl SerialDevice {
    /// Open the device node at `path` for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;
        let drain = Drain::for_file(&file).map_err(|source| TransportError::Open {
            path: path.clone(),
            source,
        })?;

        info!(?path, ?drain, "opened link device");
        Ok(Self { file, path, drain })
    }

    /// Open the device and wrap it as a byte transport.
    pub fn open_transport(path: impl AsRef<Path>) -> Result<StreamTransport<Self>> {
        Ok(StreamTransport::new(Self::open(path)?))
    }

    /// The path this device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How this device is drained on flush.
    pub fn drain(&self) -> Drain {
        self.drain
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "serial-device"
    }

    /// Try to clone this device handle (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let file = self.file.try_clone()?;
        debug!(path = ?self.path, "cloned link device handle");
        Ok(Self {
            file,
            path: self.path.clone(),
            drain: self.drain,
        })
    }
}

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    /// Blocks until written bytes have left the host: `tcdrain` on a
    /// terminal line, `fdatasync` on a capture file.
    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()?;
        match self.drain {
            Drain::Terminal => tcdrain(&self.file),
            Drain::File => self.file.sync_data(),
            Drain::Immediate => Ok(()),
        }
    }
}

#[cfg(unix)]
fn tcdrain(file: &File) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::tcdrain(file.as_raw_fd()) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn tcdrain(_file: &File) -> io::Result<()> {
    Ok(())
}

impl std::fmt::Debug for SerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("path", &self.path)
            .finish()
    }
}
