use std::{
    fmt::Display,
    io::{self, BufRead, BufReader, Write},
    net::Shutdown,
    time::Duration,
};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{ClientCodec, NetworkStream, TlsParameters};
use crate::{
    authentication::{Credentials, Mechanism},
    commands::{Auth, Data, Ehlo, Helo, Mail, MailParameter, Quit, Rcpt, Starttls},
    error::{self, Error},
    extension::{ClientId, ServerInfo},
    response::{parse_response, Response},
};

/// Structure that implements the SMTP client
pub struct SmtpConnection {
    /// TCP stream between client and server
    stream: BufReader<NetworkStream>,
    /// Whether QUIT has been sent
    sent_quit: bool,
    /// Whether the stream or the server stopped making sense
    broken: bool,
    /// Information about the server
    server_info: ServerInfo,
}

impl SmtpConnection {
    /// Get information about the server
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Connects to the configured server
    ///
    /// Reads the greeting, sends EHLO and parses server information
    pub fn connect(
        server: &str,
        port: u16,
        timeout: Option<Duration>,
        hello_name: &ClientId,
    ) -> Result<SmtpConnection, Error> {
        let stream = NetworkStream::connect(server, port, timeout)?;
        Self::from_stream(stream, timeout, hello_name)
    }

    /// Starts a session on an already opened stream
    pub fn from_stream(
        stream: NetworkStream,
        timeout: Option<Duration>,
        hello_name: &ClientId,
    ) -> Result<SmtpConnection, Error> {
        let mut conn = SmtpConnection {
            stream: BufReader::new(stream),
            sent_quit: false,
            broken: false,
            server_info: ServerInfo::default(),
        };
        conn.set_timeout(timeout).map_err(error::network)?;

        let greeting = conn.read_response()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("greeting {}", greeting.first_line().unwrap_or_default());
        #[cfg(not(feature = "tracing"))]
        let _ = greeting;

        conn.ehlo(hello_name)?;

        // Print server information
        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", conn.server_info);
        Ok(conn)
    }

    /// Tells if the server offers an upgrade the stream does not have yet
    pub fn can_starttls(&self) -> bool {
        !self.is_encrypted() && self.server_info.supports_starttls()
    }

    /// Sends STARTTLS, upgrades the stream and greets the server again
    ///
    /// Anything the server sent after its STARTTLS reply arrived in plaintext
    /// and must not be read as if it came through TLS, so it breaks the
    /// connection.
    pub fn starttls(
        &mut self,
        tls_parameters: &TlsParameters,
        hello_name: &ClientId,
    ) -> Result<(), Error> {
        if !self.server_info.supports_starttls() {
            return Err(error::client("STARTTLS is not supported on this server"));
        }

        self.command(Starttls)?;
        if !self.stream.buffer().is_empty() {
            self.broken = true;
            return Err(error::tls("data received after the STARTTLS reply"));
        }
        if let Err(err) = self.stream.get_mut().upgrade_tls(tls_parameters) {
            self.broken = true;
            return Err(err);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");
        // Send EHLO again
        self.ehlo(hello_name)
    }

    /// Send EHLO and update server info, falling back to HELO
    fn ehlo(&mut self, hello_name: &ClientId) -> Result<(), Error> {
        match self.command(Ehlo::new(hello_name.clone())) {
            Ok(ehlo_response) => {
                self.server_info = ServerInfo::from_response(&ehlo_response)?;
                Ok(())
            }
            Err(err) if err.is_permanent() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("EHLO rejected, trying HELO: {}", err);
                let helo_response = self.command(Helo::new(hello_name.clone()))?;
                self.server_info = ServerInfo::from_helo_response(&helo_response);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Authenticates with the first of `mechanisms` the server accepts
    ///
    /// The credentials go with the initial response, so a `334` challenge in
    /// return leaves the exchange in a state the client can't finish.
    pub fn auth(
        &mut self,
        mechanisms: &[Mechanism],
        credentials: &Credentials,
    ) -> Result<Response, Error> {
        let mechanism = self
            .server_info
            .get_auth_mechanism(mechanisms)
            .ok_or_else(|| error::client("No compatible authentication mechanism was found"))?;

        let response = self.secret_command(Auth::new(mechanism, credentials))?;
        if response.has_code(334) {
            self.broken = true;
            return Err(error::response("unexpected authentication challenge"));
        }
        Ok(response)
    }

    /// Declares the sender
    ///
    /// `BODY=8BITMIME` and `SMTPUTF8` are added when the server advertises them.
    pub fn mail(&mut self, sender: &str) -> Result<Response, Error> {
        let mut mail_options = vec![];

        // Internationalization handling
        //
        // * 8BITMIME: https://tools.ietf.org/html/rfc6152
        // * SMTPUTF8: https://tools.ietf.org/html/rfc6531
        if self.server_info.supports_8bitmime() {
            mail_options.push(MailParameter::EightBitMime);
        }
        if self.server_info.supports_smtputf8() {
            mail_options.push(MailParameter::SmtpUtf8);
        }

        self.command(Mail::new(sender.to_owned(), mail_options))
    }

    /// Declares one recipient
    pub fn rcpt(&mut self, recipient: &str) -> Result<Response, Error> {
        self.command(Rcpt::new(recipient.to_owned()))
    }

    /// Opens the message data
    pub fn data(&mut self) -> Result<Response, Error> {
        self.command(Data)
    }

    /// Sends the message content and the end of data indicator
    pub fn message(&mut self, message: &[u8]) -> Result<Response, Error> {
        let mut codec = ClientCodec::new();
        let mut out_buf = Vec::with_capacity(message.len() + 5);
        codec.encode(message, &mut out_buf);
        out_buf.extend_from_slice(codec.terminator());
        self.write(&out_buf)?;

        self.read_response()
    }

    /// Ends the session
    pub fn quit(&mut self) -> Result<Response, Error> {
        self.sent_quit = true;
        self.command(Quit)
    }

    /// Says goodbye if it was not done yet, and shuts the stream down
    pub fn abort(&mut self) {
        // Only try to quit if we are not already broken
        if !self.sent_quit && !self.broken {
            let _ = self.quit();
        }

        if !self.broken {
            let _ = self.stream.get_ref().shutdown(Shutdown::Both);
        }
    }

    /// Tells if the connection can't be used anymore
    pub fn has_broken(&self) -> bool {
        self.sent_quit || self.broken
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    /// Set timeout
    pub fn set_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        self.stream.get_mut().set_read_timeout(duration)?;
        self.stream.get_mut().set_write_timeout(duration)
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;
        self.read_response()
    }

    /// Sends an SMTP command carrying credentials, which are kept out of the logs
    fn secret_command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.send_bytes(command.to_string().as_bytes())?;
        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: <authentication data>");
        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, string: &[u8]) -> Result<(), Error> {
        self.send_bytes(string)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Wrote: {}", escape_crlf(&String::from_utf8_lossy(string)));
        Ok(())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.get_mut();
        if let Err(err) = stream.write_all(bytes).and_then(|()| stream.flush()) {
            self.broken = true;
            return Err(error::network(err));
        }
        Ok(())
    }

    /// Gets the SMTP response
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        loop {
            match self.stream.read_line(&mut buffer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    self.broken = true;
                    return Err(error::network(err));
                }
            }

            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(
                            response.code(),
                            Some(response.message().collect()),
                        ))
                    };
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Failure(e)) | Err(nom::Err::Error(e)) => {
                    self.broken = true;
                    return Err(error::response(e.to_string()));
                }
            }
        }

        self.broken = true;
        Err(error::response("incomplete response"))
    }
}
