//! # Lectura del Request desde el Socket
//! src/http/reader.rs
//!
//! Lee la cabecera con `peek` hasta ver el primer `\r\n\r\n` y consume
//! exactamente esos bytes; después, si hay `Content-Length`, lee el body.
//! El timeout de lectura lo fija el servidor sobre el socket.

use super::request::find_subsequence;
use std::io::{self, Read};
use std::net::TcpStream;

/// Tamaño de cada `peek`
pub const PEEK_CHUNK: usize = 4096;

/// Cota de la cabecera (request line + headers)
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Cota del body; un `Content-Length` mayor se trunca
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Fuente de bytes que permite mirar sin consumir
pub trait Peek: Read {
    fn peek(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Peek for TcpStream {
    fn peek(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::peek(self, buf)
    }
}

/// Lee un request completo (cabecera + body declarado)
///
/// Un EOF antes del terminador devuelve lo leído hasta ahí; los errores de
/// I/O (incluido el timeout) se propagan.
pub fn read_request<S: Peek>(stream: &mut S) -> io::Result<Vec<u8>> {
    let mut request = read_head(stream)?;

    if let Some(length) = content_length(&request) {
        let length = length.min(MAX_BODY_BYTES);
        if length > 0 {
            let mut body = Vec::with_capacity(length);
            stream.by_ref().take(length as u64).read_to_end(&mut body)?;
            request.extend_from_slice(&body);
        }
    }

    Ok(request)
}

/// Consume la cabecera sin tocar los bytes del body
fn read_head<S: Peek>(stream: &mut S) -> io::Result<Vec<u8>> {
    let mut head = Vec::new();
    let mut chunk = [0u8; PEEK_CHUNK];

    loop {
        let peeked = stream.peek(&mut chunk)?;
        if peeked == 0 {
            break;
        }

        // El terminador puede quedar partido entre lo ya consumido y el
        // chunk actual: buscamos con los últimos 3 bytes como solapamiento.
        let overlap = head.len().min(TERMINATOR.len() - 1);
        let mut window = head[head.len() - overlap..].to_vec();
        window.extend_from_slice(&chunk[..peeked]);

        let (consume, done) = match find_subsequence(&window, TERMINATOR) {
            Some(pos) => (pos + TERMINATOR.len() - overlap, true),
            None => (peeked, false),
        };

        let start = head.len();
        head.resize(start + consume, 0);
        stream.read_exact(&mut head[start..])?;

        if done || head.len() >= MAX_HEAD_BYTES {
            break;
        }
    }

    Ok(head)
}

/// Valor de `Content-Length` en una cabecera cruda
pub fn content_length(head: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(head);
    text.split('\n')
        .skip(1)
        .map(|line| line.trim_end_matches('\r'))
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
