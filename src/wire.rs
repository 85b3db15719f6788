use snafu::Snafu;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use thiserror::Error;

/// Version byte of SOCKS4 messages
pub const SOCKS4_VERSION: u8 = 0x04;
/// Version byte of SOCKS5 messages
pub const SOCKS5_VERSION: u8 = 0x05;

/// Sub-negotiation version byte from rfc 1929
const AUTH_VERSION: u8 = 0x01;

const RESERVED: u8 = 0x00;

/// The client sent bytes that do not decode as any SOCKS message. The raw
/// bytes are kept for diagnostics; the server never replies to these.
#[derive(Error, Debug)]
#[error("undecodable message: {data:02x?}")]
pub struct PackageError {
    pub data: Vec<u8>,
}

impl PackageError {
    fn new(data: &[u8]) -> Self {
        PackageError {
            data: data.to_vec(),
        }
    }
}

/// SOCKS4 CMD Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks4Command {
    Connect = 0x01,
    Bind = 0x02,
}

impl Socks4Command {
    /// Parse Byte to Command
    fn from(n: u8) -> Option<Socks4Command> {
        match n {
            1 => Some(Socks4Command::Connect),
            2 => Some(Socks4Command::Bind),
            _ => None,
        }
    }
}

/// SOCKS4 reply codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks4Reply {
    Granted = 0x5a,
    Rejected = 0x5b,
    IdentdNotReachable = 0x5c,
    IdentdRejected = 0x5d,
}

/// Client Authentication Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethods {
    /// No Authentication
    NoAuth = 0x00,
    GssApi = 0x01,
    /// Authenticate with a username / password
    UserPass = 0x02,
    /// Cannot authenticate
    NoMethods = 0xff,
}

impl AuthMethods {
    fn from(n: u8) -> Option<AuthMethods> {
        match n {
            0x00 => Some(AuthMethods::NoAuth),
            0x01 => Some(AuthMethods::GssApi),
            0x02 => Some(AuthMethods::UserPass),
            0xff => Some(AuthMethods::NoMethods),
            _ => None,
        }
    }
}

/// Sub-negotiation status from rfc 1929
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReply {
    Success = 0x00,
    Fail = 0x01,
}

/// SOCKS5 CMD Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks5Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

impl Socks5Command {
    /// Parse Byte to Command
    fn from(n: u8) -> Option<Socks5Command> {
        match n {
            1 => Some(Socks5Command::Connect),
            2 => Some(Socks5Command::Bind),
            3 => Some(Socks5Command::UdpAssociate),
            _ => None,
        }
    }
}

/// DST.addr variant types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrType {
    /// IP V4 address: X'01'
    V4 = 0x01,
    /// DOMAINNAME: X'03'
    Domain = 0x03,
    /// IP V6 address: X'04'
    V6 = 0x04,
}

impl AddrType {
    /// Parse Byte to AddrType
    fn from(n: u8) -> Option<AddrType> {
        match n {
            1 => Some(AddrType::V4),
            3 => Some(AddrType::Domain),
            4 => Some(AddrType::V6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
/// Possible SOCKS5 Response Codes
pub enum ResponseCode {
    Success = 0x00,
    #[snafu(display("SOCKS5 Server Failure"))]
    Failure = 0x01,
    #[snafu(display("SOCKS5 Rule failure"))]
    RuleFailure = 0x02,
    #[snafu(display("network unreachable"))]
    NetworkUnreachable = 0x03,
    #[snafu(display("host unreachable"))]
    HostUnreachable = 0x04,
    #[snafu(display("connection refused"))]
    ConnectionRefused = 0x05,
    #[snafu(display("TTL expired"))]
    TtlExpired = 0x06,
    #[snafu(display("Command not supported"))]
    CommandNotSupported = 0x07,
    #[snafu(display("Addr Type not supported"))]
    AddrTypeNotSupported = 0x08,
}

/// SOCKS4 CONNECT request.
///
///   +----+----+----+----+----+----+----+----+----+----+....+----+
///   | VN | CD | DSTPORT |      DSTIP        | USERID       |NULL|
///   +----+----+----+----+----+----+----+----+----+----+....+----+
///     1    1      2              4           variable       1
///
/// The SOCKS4a extension signals a domain destination with a DSTIP of the
/// form 0.0.0.x (x nonzero); the domain then follows the USERID null,
/// terminated by a second null:
///
///   ... | USERID |NULL| HOSTNAME |NULL|
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    pub command: Socks4Command,
    pub destination: SocketAddrV4,
    pub username: Option<String>,
    pub domain_name: Option<String>,
}

impl Socks4Request {
    pub fn parse(data: &[u8]) -> Result<Self, PackageError> {
        if data.len() < 9 {
            return Err(PackageError::new(data));
        }
        if data[0] != SOCKS4_VERSION {
            return Err(PackageError::new(data));
        }
        let command = Socks4Command::from(data[1]).ok_or_else(|| PackageError::new(data))?;
        if data[data.len() - 1] != 0 {
            return Err(PackageError::new(data));
        }
        let port = u16::from_be_bytes([data[2], data[3]]);
        let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
        let socks4a = matches!(ip.octets(), [0, 0, 0, x] if x != 0);

        // Tail between the fixed header and the final null: USERID, then for
        // SOCKS4a a second null-terminated HOSTNAME.
        let tail = &data[8..data.len() - 1];
        let segments: Vec<&[u8]> = tail.split(|byte| *byte == 0).collect();
        let (username_bytes, domain_bytes) = match segments.as_slice() {
            [single] if socks4a => (&[][..], *single),
            [single] => (*single, &[][..]),
            [username, domain] => (*username, *domain),
            _ => return Err(PackageError::new(data)),
        };
        if !socks4a && !domain_bytes.is_empty() {
            return Err(PackageError::new(data));
        }
        if socks4a && domain_bytes.is_empty() {
            return Err(PackageError::new(data));
        }

        Ok(Socks4Request {
            command,
            destination: SocketAddrV4::new(ip, port),
            username: decode_utf8(username_bytes, data)?,
            domain_name: decode_utf8(domain_bytes, data)?,
        })
    }

    /// A domain destination was signalled via the 0.0.0.x DSTIP range.
    pub fn is_socks4a(&self) -> bool {
        self.domain_name.is_some()
    }
}

/// SOCKS4 reply: `0x00 | REP | DSTPORT | DSTIP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Socks4Response {
    pub reply: Socks4Reply,
    pub destination: Option<SocketAddrV4>,
}

impl Socks4Response {
    pub fn new(reply: Socks4Reply, destination: Option<SocketAddrV4>) -> Self {
        Socks4Response { reply, destination }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        // 0.0.0.1:0 when there is no better destination to echo
        let destination = self
            .destination
            .unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::new(0, 0, 0, 1), 0));
        let mut buf = [0u8; 8];
        buf[1] = self.reply as u8;
        buf[2..4].copy_from_slice(&destination.port().to_be_bytes());
        buf[4..8].copy_from_slice(&destination.ip().octets());
        buf
    }
}

/// SOCKS5 method selection message: `VER | NMETHODS | METHODS...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingRequest {
    pub methods: Vec<AuthMethods>,
}

impl GreetingRequest {
    pub fn parse(data: &[u8]) -> Result<Self, PackageError> {
        if data.len() < 3 {
            return Err(PackageError::new(data));
        }
        if data[0] != SOCKS5_VERSION {
            return Err(PackageError::new(data));
        }
        let nmethods = data[1] as usize;
        let methods = &data[2..];
        if nmethods == 0 || nmethods != methods.len() {
            return Err(PackageError::new(data));
        }
        let methods = methods
            .iter()
            .map(|raw| AuthMethods::from(*raw).ok_or_else(|| PackageError::new(data)))
            .collect::<Result<Vec<AuthMethods>, PackageError>>()?;
        Ok(GreetingRequest { methods })
    }
}

/// SOCKS5 method selection reply: `0x05 | METHOD`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreetingResponse {
    pub method: AuthMethods,
}

impl GreetingResponse {
    pub fn new(method: AuthMethods) -> Self {
        GreetingResponse { method }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [SOCKS5_VERSION, self.method as u8]
    }
}

/// Username/password sub-negotiation request from rfc 1929:
/// `0x01 | ULEN | UNAME | PLEN | PASSWD`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

impl AuthRequest {
    pub fn parse(data: &[u8]) -> Result<Self, PackageError> {
        if data.len() < 3 {
            return Err(PackageError::new(data));
        }
        if data[0] != AUTH_VERSION {
            return Err(PackageError::new(data));
        }
        let ulen = data[1] as usize;
        if data.len() < 3 + ulen {
            return Err(PackageError::new(data));
        }
        let plen = data[2 + ulen] as usize;
        if data.len() != 3 + ulen + plen {
            return Err(PackageError::new(data));
        }
        let username = String::from_utf8(data[2..2 + ulen].to_vec())
            .map_err(|_| PackageError::new(data))?;
        let password = String::from_utf8(data[3 + ulen..].to_vec())
            .map_err(|_| PackageError::new(data))?;
        Ok(AuthRequest { username, password })
    }
}

/// Sub-negotiation status reply: `0x01 | STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResponse {
    pub reply: AuthReply,
}

impl AuthResponse {
    pub fn new(is_success: bool) -> Self {
        let reply = if is_success {
            AuthReply::Success
        } else {
            AuthReply::Fail
        };
        AuthResponse { reply }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [AUTH_VERSION, self.reply as u8]
    }
}

/// Destination requested by a SOCKS5 CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Socks5Dest {
    Ip(SocketAddr),
    Domain(String, u16),
    /// ATYP byte the server does not know; recognized only to be rejected
    /// with `AddrTypeNotSupported`.
    Unknown(u8),
}

/// SOCKS5 request from rfc 1928 (S4):
/// `VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub command: Socks5Command,
    pub dest: Socks5Dest,
}

impl ConnectRequest {
    pub fn parse(data: &[u8]) -> Result<Self, PackageError> {
        if data.len() < 4 {
            return Err(PackageError::new(data));
        }
        if data[0] != SOCKS5_VERSION {
            return Err(PackageError::new(data));
        }
        let command = Socks5Command::from(data[1]).ok_or_else(|| PackageError::new(data))?;
        if data[2] != RESERVED {
            return Err(PackageError::new(data));
        }
        let addr_type = match AddrType::from(data[3]) {
            Some(addr_type) => addr_type,
            None => {
                return Ok(ConnectRequest {
                    command,
                    dest: Socks5Dest::Unknown(data[3]),
                });
            }
        };
        let dest = match addr_type {
            AddrType::V4 => {
                if data.len() != 10 {
                    return Err(PackageError::new(data));
                }
                let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
                let port = u16::from_be_bytes([data[8], data[9]]);
                Socks5Dest::Ip(SocketAddr::V4(SocketAddrV4::new(ip, port)))
            }
            AddrType::V6 => {
                if data.len() != 22 {
                    return Err(PackageError::new(data));
                }
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&data[4..20]);
                let port = u16::from_be_bytes([data[20], data[21]]);
                Socks5Dest::Ip(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(octets),
                    port,
                    0,
                    0,
                )))
            }
            AddrType::Domain => {
                let dlen = data[4] as usize;
                if dlen == 0 || data.len() != 7 + dlen {
                    return Err(PackageError::new(data));
                }
                let domain = String::from_utf8(data[5..5 + dlen].to_vec())
                    .map_err(|_| PackageError::new(data))?;
                let port = u16::from_be_bytes([data[5 + dlen], data[6 + dlen]]);
                Socks5Dest::Domain(domain, port)
            }
        };
        Ok(ConnectRequest { command, dest })
    }
}

/// SOCKS5 reply from rfc 1928 (S6):
///
///    +----+-----+-------+------+----------+----------+
///    |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
///    +----+-----+-------+------+----------+----------+
///    | 1  |  1  | X'00' |  1   | Variable |    2     |
///    +----+-----+-------+------+----------+----------+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResponse {
    pub reply: ResponseCode,
    pub destination: Option<SocketAddr>,
}

impl ConnectResponse {
    pub fn new(reply: ResponseCode, destination: Option<SocketAddr>) -> Self {
        ConnectResponse { reply, destination }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![SOCKS5_VERSION, self.reply as u8, RESERVED];
        match self.destination {
            Some(SocketAddr::V4(addr)) => {
                buf.push(AddrType::V4 as u8);
                buf.extend_from_slice(&addr.ip().octets());
                buf.extend_from_slice(&addr.port().to_be_bytes());
            }
            Some(SocketAddr::V6(addr)) => {
                buf.push(AddrType::V6 as u8);
                buf.extend_from_slice(&addr.ip().octets());
                buf.extend_from_slice(&addr.port().to_be_bytes());
            }
            // 0.0.0.0:0 when there is no better destination to echo
            None => {
                buf.push(AddrType::V4 as u8);
                buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
            }
        }
        buf
    }
}

fn decode_utf8(bytes: &[u8], raw: &[u8]) -> Result<Option<String>, PackageError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    String::from_utf8(bytes.to_vec())
        .map(Some)
        .map_err(|_| PackageError::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socks4_request() {
        let request = Socks4Request::parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01\x00").unwrap();
        assert_eq!(request.command, Socks4Command::Connect);
        assert_eq!(
            request.destination,
            SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 80)
        );
        assert_eq!(request.username, None);
        assert!(!request.is_socks4a());
    }

    #[test]
    fn socks4_request_with_userid() {
        let request = Socks4Request::parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01david\x00").unwrap();
        assert_eq!(request.username.as_deref(), Some("david"));
        assert_eq!(request.domain_name, None);
    }

    #[test]
    fn socks4a_request_with_domain() {
        let data = b"\x04\x01\x01\xbb\x00\x00\x00\x01\x00google.com\x00";
        let request = Socks4Request::parse(data).unwrap();
        assert!(request.is_socks4a());
        assert_eq!(request.username, None);
        assert_eq!(request.domain_name.as_deref(), Some("google.com"));
        assert_eq!(request.destination.port(), 443);
    }

    #[test]
    fn socks4a_range_boundaries() {
        // 0.0.0.255 is still inside the SOCKS4a range
        let data = b"\x04\x01\x01\xbb\x00\x00\x00\xffhost\x00";
        assert!(Socks4Request::parse(data).unwrap().is_socks4a());
        // 0.0.1.0 is a plain SOCKS4 destination
        let data = b"\x04\x01\x01\xbb\x00\x00\x01\x00\x00";
        assert!(!Socks4Request::parse(data).unwrap().is_socks4a());
    }

    #[test]
    fn socks4a_request_requires_domain() {
        assert!(Socks4Request::parse(b"\x04\x01\x01\xbb\x00\x00\x00\x01\x00").is_err());
        assert!(Socks4Request::parse(b"\x04\x01\x01\xbb\x00\x00\x00\x01user\x00\x00").is_err());
    }

    #[test]
    fn socks4_request_rejects_malformed() {
        // wrong version
        assert!(Socks4Request::parse(b"\x05\x01\x00\x50\x7f\x00\x00\x01\x00").is_err());
        // unknown command
        assert!(Socks4Request::parse(b"\x04\xff\x00\x50\x7f\x00\x00\x01\x00").is_err());
        // missing terminator
        assert!(Socks4Request::parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01").is_err());
        // domain segment on a plain SOCKS4 request
        assert!(Socks4Request::parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01user\x00host\x00").is_err());
        // non-utf8 userid
        assert!(Socks4Request::parse(b"\x04\x01\x00\x50\x7f\x00\x00\x01\xff\xfe\x00").is_err());
        // too many tail segments
        assert!(
            Socks4Request::parse(b"\x04\x01\x01\xbb\x00\x00\x00\x01a\x00b\x00c\x00").is_err()
        );
    }

    #[test]
    fn socks4_response_default_destination() {
        let response = Socks4Response::new(Socks4Reply::Granted, None);
        assert_eq!(&response.to_bytes(), b"\x00\x5a\x00\x00\x00\x00\x00\x01");
    }

    #[test]
    fn socks4_response_echoes_destination() {
        let destination = SocketAddrV4::new(Ipv4Addr::new(142, 250, 74, 46), 443);
        let response = Socks4Response::new(Socks4Reply::Granted, Some(destination));
        assert_eq!(&response.to_bytes(), b"\x00\x5a\x01\xbb\x8e\xfa\x4a\x2e");
    }

    #[test]
    fn socks4_reply_is_deterministic() {
        let request = Socks4Request::parse(b"\x04\x01\x01\xbb\x8e\xfa\x4a\x2e\x00").unwrap();
        let first = Socks4Response::new(Socks4Reply::Granted, Some(request.destination));
        let second = Socks4Response::new(Socks4Reply::Granted, Some(request.destination));
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn greeting_request() {
        let request = GreetingRequest::parse(b"\x05\x01\x00").unwrap();
        assert_eq!(request.methods, vec![AuthMethods::NoAuth]);
        let request = GreetingRequest::parse(b"\x05\x02\x00\x02").unwrap();
        assert_eq!(
            request.methods,
            vec![AuthMethods::NoAuth, AuthMethods::UserPass]
        );
    }

    #[test]
    fn greeting_request_rejects_malformed() {
        // NMETHODS disagrees with the list length
        assert!(GreetingRequest::parse(b"\x05\x02\x00").is_err());
        // empty method list
        assert!(GreetingRequest::parse(b"\x05\x00").is_err());
        // unknown method byte
        assert!(GreetingRequest::parse(b"\x05\x01\x7f").is_err());
        // wrong version
        assert!(GreetingRequest::parse(b"\x04\x01\x00").is_err());
    }

    #[test]
    fn greeting_response() {
        assert_eq!(
            GreetingResponse::new(AuthMethods::NoAuth).to_bytes(),
            [0x05, 0x00]
        );
        assert_eq!(
            GreetingResponse::new(AuthMethods::NoMethods).to_bytes(),
            [0x05, 0xff]
        );
    }

    #[test]
    fn auth_request() {
        let request = AuthRequest::parse(b"\x01\x04user\x06passwd").unwrap();
        assert_eq!(request.username, "user");
        assert_eq!(request.password, "passwd");
    }

    #[test]
    fn auth_request_rejects_malformed() {
        // wrong sub-negotiation version
        assert!(AuthRequest::parse(b"\x02\x04user\x06passwd").is_err());
        // lengths disagree with the buffer
        assert!(AuthRequest::parse(b"\x01\x05user\x06passwd").is_err());
        assert!(AuthRequest::parse(b"\x01\x04user\x07passwd").is_err());
    }

    #[test]
    fn auth_response() {
        assert_eq!(AuthResponse::new(true).to_bytes(), [0x01, 0x00]);
        assert_eq!(AuthResponse::new(false).to_bytes(), [0x01, 0x01]);
    }

    #[test]
    fn connect_request_ipv4() {
        let request = ConnectRequest::parse(b"\x05\x01\x00\x01\x8e\xfa\x4a\x23\x01\xbb").unwrap();
        assert_eq!(request.command, Socks5Command::Connect);
        assert_eq!(
            request.dest,
            Socks5Dest::Ip("142.250.74.35:443".parse().unwrap())
        );
    }

    #[test]
    fn connect_request_domain() {
        let request = ConnectRequest::parse(b"\x05\x01\x00\x03\x0agoogle.com\x01\xbb").unwrap();
        assert_eq!(
            request.dest,
            Socks5Dest::Domain("google.com".to_string(), 443)
        );
    }

    #[test]
    fn connect_request_ipv6() {
        let mut data = vec![0x05, 0x01, 0x00, 0x04];
        data.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        data.extend_from_slice(&80u16.to_be_bytes());
        let request = ConnectRequest::parse(&data).unwrap();
        assert_eq!(request.dest, Socks5Dest::Ip("[::1]:80".parse().unwrap()));
    }

    #[test]
    fn connect_request_unknown_addr_type() {
        let request = ConnectRequest::parse(b"\x05\x01\x00\x05\x00\x00").unwrap();
        assert_eq!(request.dest, Socks5Dest::Unknown(0x05));
    }

    #[test]
    fn connect_request_parses_other_commands() {
        let request = ConnectRequest::parse(b"\x05\x02\x00\x01\x7f\x00\x00\x01\x00\x50").unwrap();
        assert_eq!(request.command, Socks5Command::Bind);
    }

    #[test]
    fn connect_request_rejects_malformed() {
        // nonzero reserved byte
        assert!(ConnectRequest::parse(b"\x05\x01\x01\x01\x7f\x00\x00\x01\x00\x50").is_err());
        // unknown command byte
        assert!(ConnectRequest::parse(b"\x05\x09\x00\x01\x7f\x00\x00\x01\x00\x50").is_err());
        // truncated address
        assert!(ConnectRequest::parse(b"\x05\x01\x00\x01\x7f\x00\x00").is_err());
        // empty domain
        assert!(ConnectRequest::parse(b"\x05\x01\x00\x03\x00\x01\xbb").is_err());
        // domain length disagrees with the buffer
        assert!(ConnectRequest::parse(b"\x05\x01\x00\x03\x0bgoogle.com\x01\xbb").is_err());
    }

    #[test]
    fn connect_response_round_trips_request_destination() {
        let request = ConnectRequest::parse(b"\x05\x01\x00\x01\x8e\xfa\x4a\x23\x01\xbb").unwrap();
        let destination = match request.dest {
            Socks5Dest::Ip(addr) => addr,
            _ => unreachable!(),
        };
        let response = ConnectResponse::new(ResponseCode::Success, Some(destination));
        assert_eq!(
            response.to_bytes(),
            b"\x05\x00\x00\x01\x8e\xfa\x4a\x23\x01\xbb"
        );
    }

    #[test]
    fn connect_response_ipv6() {
        let destination: SocketAddr = "[::1]:80".parse().unwrap();
        let response = ConnectResponse::new(ResponseCode::Success, Some(destination));
        let mut expected = vec![0x05, 0x00, 0x00, 0x04];
        expected.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        expected.extend_from_slice(&80u16.to_be_bytes());
        assert_eq!(response.to_bytes(), expected);
    }

    #[test]
    fn connect_response_default_destination() {
        let response = ConnectResponse::new(ResponseCode::Failure, None);
        assert_eq!(response.to_bytes(), b"\x05\x01\x00\x01\x00\x00\x00\x00\x00\x00");
    }
}
