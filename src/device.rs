use std::{
    io::Read,
    time::{Duration, Instant},
};

use serialport::SerialPort;

use log::warn;

use crate::errors::Error;

/// [Interface] to the GNSS module byte stream
pub enum Interface {
    /// [Interface::ReadOnly] is dedicated to read only input,
    /// mainly canned byte streams (replay, tests).
    ReadOnly(Box<dyn Read>),

    /// [Interface::Port] is used to connect to a physical port,
    /// and actively operate a GNSS module.
    Port(Box<dyn SerialPort>),
}

impl Interface {
    /// Creates a new [SerialPort] interface
    pub fn from_serial_port(port: Box<dyn SerialPort>) -> Self {
        Self::Port(port)
    }

    /// Creates a new Read-Only interface
    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        Self::ReadOnly(Box::new(reader))
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly(_))
    }
}

impl std::io::Read for Interface {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::ReadOnly(r) => r.read(buf),
            Self::Port(port) => port.read(buf),
        }
    }
}

impl std::io::Write for Interface {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::ReadOnly(_) => Ok(buf.len()),
            Self::Port(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::ReadOnly(_) => Ok(()),
            Self::Port(port) => port.flush(),
        }
    }
}

/// Outcome of one AT command exchange. Immutable once returned.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Command as sent, without the trailing carriage return
    pub command: String,

    /// True only when the module answered with a literal "OK"
    pub acknowledged: bool,

    /// Every line received during the exchange, in arrival order
    pub raw_lines: Vec<String>,
}

pub struct Device {
    pub interface: Interface,

    /// Bytes received but not yet line-terminated
    pending: Vec<u8>,
}

impl Device {
    /// Opens `port_str` at `baud` and attaches to it.
    pub fn open(port_str: &str, baud: u32) -> Result<Self, Error> {
        let port = serialport::new(port_str, baud)
            .timeout(Duration::from_millis(250))
            .open()
            .map_err(|e| Error::ChannelOpen {
                port: port_str.to_string(),
                source: e,
            })?;

        Ok(Self::from_interface(Interface::from_serial_port(port)))
    }

    /// Attaches to any [Interface], typically a canned byte stream.
    pub fn from_interface(interface: Interface) -> Self {
        Self {
            interface,
            pending: Vec::with_capacity(128),
        }
    }

    /// Sends one AT command (no trailing CR in `command`) and reads lines
    /// until a literal "OK" (acknowledged), a literal "ERROR" (failed), or
    /// `timeout` elapsed (failed). Each line is echoed in arrival order and
    /// kept in the [CommandResult]. Bounded by `timeout` plus one port read.
    pub fn send_command(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult, Error> {
        use std::io::Write;

        self.interface.write_all(command.as_bytes())?;
        self.interface.write_all(b"\r")?;
        self.interface.flush()?;

        println!(">>> {}", command);

        let deadline = Instant::now() + timeout;

        let mut acknowledged = false;
        let mut raw_lines = Vec::new();

        while Instant::now() < deadline {
            let line = match self.read_line()? {
                Some(line) => line,
                None => continue,
            };

            if line.is_empty() {
                continue;
            }

            println!("{}", line);

            let terminal = line == "OK" || line == "ERROR";
            acknowledged = line == "OK";
            raw_lines.push(line);

            if terminal {
                break;
            }
        }

        if !acknowledged {
            warn!("no OK for \"{}\" (timeout/error)", command);
        }

        Ok(CommandResult {
            command: command.to_string(),
            acknowledged,
            raw_lines,
        })
    }

    /// Reads one line from the interface, without blocking past the port's
    /// own timeout: returns Ok(None) when no complete line is available yet.
    /// Non-ASCII bytes are dropped, leading/trailing whitespace trimmed.
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut chunk = [0; 256];

        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = self.pending.drain(..=pos).collect();
                return Ok(Some(decode_permissive(&raw)));
            }

            let nbytes = self.read_interface(&mut chunk)?;

            if nbytes == 0 {
                // a drained read-only source may still hold an unterminated tail
                if self.interface.is_read_only() && !self.pending.is_empty() {
                    let raw: Vec<u8> = self.pending.drain(..).collect();
                    return Ok(Some(decode_permissive(&raw)));
                }

                return Ok(None);
            }

            self.pending.extend_from_slice(&chunk[..nbytes]);
        }
    }

    /// Reads the interface, converting timeouts into "no data received"
    fn read_interface(&mut self, output: &mut [u8]) -> std::io::Result<usize> {
        match self.interface.read(output) {
            Ok(b) => Ok(b),
            Err(e) => {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    Ok(0)
                } else {
                    Err(e)
                }
            },
        }
    }
}

fn decode_permissive(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| b.is_ascii())
        .map(|b| *b as char)
        .collect::<String>()
        .trim()
        .to_string()
}
