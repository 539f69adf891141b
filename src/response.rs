//! Server replies
//!
//! A reply is a three digit code followed by one or more text lines. Every
//! line but the last one has a `-` after the code:
//!
//! ```text
//! 250-smtp.gmail.com at your service
//! 250 STARTTLS
//! ```

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use nom::{
    branch::alt,
    bytes::streaming::{tag, take_until, take_while_m_n},
    combinator::{map_opt, peek, value},
    error::ErrorKind,
    IResult, Parser,
};

use crate::error::{self, Error};

/// A reply code, between 200 and 559
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub struct Code(u16);

impl Code {
    /// Checks the digits of a reply code
    ///
    /// The first digit goes from 2 to 5, the second one from 0 to 5.
    pub fn new(code: u16) -> Option<Code> {
        let valid = (2..=5).contains(&(code / 100)) && code / 10 % 10 <= 5;
        valid.then_some(Code(code))
    }

    /// 2xx and 3xx replies
    pub fn is_positive(self) -> bool {
        self.0 < 400
    }

    /// 4xx replies, the command may succeed later
    pub fn is_transient(self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx replies
    pub fn is_permanent(self) -> bool {
        self.0 >= 500
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.0
    }
}

/// A complete, possibly multi-line, reply
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    code: Code,
    lines: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Response, Error> {
        match parse_response(s) {
            Ok((_, response)) => Ok(response),
            Err(err) => Err(error::response(err.to_string())),
        }
    }
}

impl Response {
    /// Creates a reply
    pub fn new(code: Code, lines: Vec<String>) -> Response {
        Response { code, lines }
    }

    /// The reply code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Tells if the reply is 2xx or 3xx
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Compares the reply code with `code`
    pub fn has_code(&self, code: u16) -> bool {
        self.code.0 == code
    }

    /// The first word of the text, the server name in greetings and EHLO replies
    pub fn first_word(&self) -> Option<&str> {
        self.first_line()
            .and_then(|line| line.split_whitespace().next())
    }

    /// The first line of text
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    /// The lines of text, without their codes
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

fn reply_code(i: &str) -> IResult<&str, Code> {
    map_opt(
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
        |digits: &str| digits.parse().ok().and_then(Code::new),
    )
    .parse(i)
}

/// One line of a reply: its code, whether more lines follow, and its text
fn reply_line(i: &str) -> IResult<&str, (Code, bool, &str)> {
    let more = alt((
        value(true, tag("-")),
        value(false, tag(" ")),
        value(false, peek(tag("\r\n"))),
    ));
    let (i, (code, more, text, _)) =
        (reply_code, more, take_until("\r\n"), tag("\r\n")).parse(i)?;
    Ok((i, (code, more, text)))
}

/// Parses a reply from the beginning of `i`
///
/// Returns `Incomplete` until the last line of the reply has been received.
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (mut i, (code, mut more, text)) = reply_line(i)?;
    let mut lines = vec![text.to_owned()];

    while more {
        let (rest, (line_code, line_more, text)) = reply_line(i)?;
        if line_code != code {
            return Err(nom::Err::Failure(nom::error::Error::new(i, ErrorKind::Verify)));
        }
        lines.push(text.to_owned());
        more = line_more;
        i = rest;
    }

    Ok((i, Response { code, lines }))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn code_digits() {
        assert_eq!(Code::new(421).map(u16::from), Some(421));
        assert_eq!(Code::new(559).map(|code| code.to_string()), Some("559".to_owned()));
        assert_eq!(Code::new(199), None);
        assert_eq!(Code::new(260), None);
        assert_eq!(Code::new(600), None);

        let code = Code::new(354).unwrap();
        assert!(code.is_positive() && !code.is_transient() && !code.is_permanent());
        assert!(Code::new(451).unwrap().is_transient());
        assert!(Code::new(550).unwrap().is_permanent());
    }

    #[test]
    fn multiline_reply() {
        let response: Response = "250-me\r\n250-8BITMIME\r\n250 AUTH PLAIN CRAM-MD5\r\n"
            .parse()
            .unwrap();

        assert_eq!(
            response,
            Response::new(
                Code::new(250).unwrap(),
                vec![
                    "me".to_owned(),
                    "8BITMIME".to_owned(),
                    "AUTH PLAIN CRAM-MD5".to_owned(),
                ],
            )
        );
    }

    #[test]
    fn malformed_replies() {
        assert!("2506-me\r\n250 ok\r\n".parse::<Response>().is_err());
        assert!("250-me\r\n251 ok\r\n".parse::<Response>().is_err());
        assert!("hello\r\n".parse::<Response>().is_err());
        // the last line is missing
        assert!("250-me\r\n250-8BITMIME\r\n".parse::<Response>().is_err());
    }

    #[test]
    fn reply_without_text() {
        let response: Response = "250\r\n".parse().unwrap();

        assert!(response.has_code(250));
        assert_eq!(response.first_line(), Some(""));
        assert_eq!(response.first_word(), None);
    }

    #[test]
    fn incomplete_reply() {
        assert!(matches!(
            parse_response("250-smtp.gmail.com at your service\r\n250-SIZE"),
            Err(nom::Err::Incomplete(_))
        ));
        assert!(matches!(parse_response("25"), Err(nom::Err::Incomplete(_))));
    }

    #[test]
    fn trailing_data_is_left() {
        let (rest, response) = parse_response("220 ready\r\n250 next\r\n").unwrap();

        assert!(response.has_code(220));
        assert_eq!(rest, "250 next\r\n");
    }

    #[test]
    fn reply_text() {
        let response: Response = "220 smtp.gmail.com ESMTP ready\r\n".parse().unwrap();

        assert_eq!(response.first_word(), Some("smtp.gmail.com"));
        assert_eq!(response.first_line(), Some("smtp.gmail.com ESMTP ready"));
        assert!(response.is_positive());
        assert!(!response.has_code(250));
    }
}
