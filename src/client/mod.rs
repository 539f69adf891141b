//! SMTP client
//!
//! A blocking SMTP client, just enough of it to submit one message per
//! connection: greeting and `EHLO`, `STARTTLS`, `AUTH`, the mail transaction
//! and `QUIT`.

pub use self::{
    connection::SmtpConnection,
    mock::MockStream,
    net::NetworkStream,
    tls::{Certificate, CertificateStore, TlsParameters, TlsParametersBuilder, TlsVersion},
};

mod connection;
mod mock;
mod net;
mod tls;

/// The codec used for transparency
///
/// Doubles every dot starting a line of the message data.
#[derive(Default, Clone, Copy, Debug)]
pub struct ClientCodec {
    status: CodecStatus,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
enum CodecStatus {
    /// A line just started
    #[default]
    LineStart,
    /// Last byte was `\r`
    Cr,
    /// Inside a line
    Normal,
}

impl ClientCodec {
    /// Creates a new client codec
    pub fn new() -> Self {
        ClientCodec::default()
    }

    /// Adds transparency
    ///
    /// A bare `\n` ends a line too, and goes out as `\r\n`.
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        buf.reserve(frame.len());
        for &byte in frame {
            self.status = match (self.status, byte) {
                (CodecStatus::LineStart, b'.') => {
                    buf.extend_from_slice(b"..");
                    CodecStatus::Normal
                }
                (CodecStatus::Cr, b'\n') => {
                    buf.push(b'\n');
                    CodecStatus::LineStart
                }
                (_, b'\n') => {
                    buf.extend_from_slice(b"\r\n");
                    CodecStatus::LineStart
                }
                (_, b'\r') => {
                    buf.push(b'\r');
                    CodecStatus::Cr
                }
                _ => {
                    buf.push(byte);
                    CodecStatus::Normal
                }
            };
        }
    }

    /// The end of data indicator to send after the encoded frames
    ///
    /// The final dot has to stand on its own line.
    pub fn terminator(&self) -> &'static [u8] {
        match self.status {
            CodecStatus::LineStart => b".\r\n",
            CodecStatus::Cr | CodecStatus::Normal => b"\r\n.\r\n",
        }
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}
