//! esp-tls (mbedTLS) session for the ESP-IDF target.
//!
//! Certificate verification is disabled: the hub is reached over the
//! LAN, usually by raw IP, where hostname verification cannot succeed.

use std::ffi::CString;
use std::io;

use esp_idf_svc::sys as sys;

use crate::ws::error::WsError;

// mbedTLS "not ready yet" codes surfaced through esp_tls read/write.
const MBEDTLS_ERR_SSL_WANT_READ: isize = -0x6900;
const MBEDTLS_ERR_SSL_WANT_WRITE: isize = -0x6880;

pub struct TlsSession {
    handle: *mut sys::esp_tls_t,
}

impl TlsSession {
    pub fn connect(host: &str, port: u16) -> Result<Self, WsError> {
        let hostname = CString::new(host).map_err(|_| {
            WsError::Transport(io::Error::new(io::ErrorKind::InvalidInput, "host contains NUL"))
        })?;

        // SAFETY: esp_tls_init returns an owned handle (or null on OOM);
        // conn_new_sync fully initialises it before we use it.
        unsafe {
            let handle = sys::esp_tls_init();
            if handle.is_null() {
                return Err(WsError::Transport(io::ErrorKind::OutOfMemory.into()));
            }

            let mut cfg: sys::esp_tls_cfg = core::mem::zeroed();
            cfg.set_skip_common_name(true);
            cfg.set_non_block(true);
            cfg.timeout_ms = 10_000;

            let rc = sys::esp_tls_conn_new_sync(
                hostname.as_ptr(),
                host.len() as i32,
                i32::from(port),
                &cfg,
                handle,
            );
            if rc != 1 {
                sys::esp_tls_conn_destroy(handle);
                return Err(WsError::Transport(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "esp-tls connect failed",
                )));
            }

            Ok(Self { handle })
        }
    }

    pub fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: handle is a live esp_tls connection; buf bounds are ours.
        let rc = unsafe {
            sys::esp_tls_conn_read(self.handle, buf.as_mut_ptr().cast(), buf.len())
        };
        match rc {
            0 => Err(io::ErrorKind::UnexpectedEof.into()),
            n if n > 0 => Ok(n as usize),
            MBEDTLS_ERR_SSL_WANT_READ | MBEDTLS_ERR_SSL_WANT_WRITE => Ok(0),
            n => Err(io::Error::other(format!("esp-tls read error {n}"))),
        }
    }

    pub fn try_write(&mut self, data: &[u8]) -> io::Result<usize> {
        // SAFETY: handle is a live esp_tls connection; data bounds are ours.
        let rc = unsafe {
            sys::esp_tls_conn_write(self.handle, data.as_ptr().cast(), data.len())
        };
        match rc {
            n if n >= 0 => Ok(n as usize),
            MBEDTLS_ERR_SSL_WANT_READ | MBEDTLS_ERR_SSL_WANT_WRITE => Ok(0),
            n => Err(io::Error::other(format!("esp-tls write error {n}"))),
        }
    }
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        // SAFETY: handle was produced by esp_tls_init and not yet destroyed.
        unsafe {
            sys::esp_tls_conn_destroy(self.handle);
        }
    }
}
