//! Local configuration endpoint.
//!
//! A small HTTP server for the LAN: node status, read the active
//! dashboard file, replace it (effective on next boot). Handlers only
//! touch the filesystem, never the executor's shared state, so they
//! stay `Send` without any cross-thread plumbing.
//!
//! ## Dual-target design
//!
//! On ESP-IDF this wraps `EspHttpServer`; on the host it is a stub so
//! the rest of the crate links and tests run.

use log::info;

pub struct ConfigServer {
    dashboard_path: String,
    #[cfg(target_os = "espidf")]
    server: Option<esp_idf_svc::http::server::EspHttpServer<'static>>,
}

impl ConfigServer {
    pub fn new(dashboard_path: impl Into<String>) -> Self {
        Self {
            dashboard_path: dashboard_path.into(),
            #[cfg(target_os = "espidf")]
            server: None,
        }
    }

    #[cfg(target_os = "espidf")]
    pub fn start(&mut self) -> anyhow::Result<()> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::server::{Configuration, EspHttpServer};
        use esp_idf_svc::io::Write as _;

        let mut server = EspHttpServer::new(&Configuration::default())?;
        let path_get = self.dashboard_path.clone();
        let path_post = self.dashboard_path.clone();

        server.fn_handler("/api/status", Method::Get, |req| {
            let body = format!(
                "{{\"name\":\"hadash\",\"version\":\"{}\"}}",
                env!("CARGO_PKG_VERSION")
            );
            req.into_ok_response()?.write_all(body.as_bytes())?;
            Ok::<(), anyhow::Error>(())
        })?;

        server.fn_handler("/api/config", Method::Get, move |req| {
            match std::fs::read(&path_get) {
                Ok(bytes) => req.into_ok_response()?.write_all(&bytes)?,
                Err(_) => req
                    .into_status_response(404)?
                    .write_all(b"{\"error\":\"no dashboard config\"}")?,
            }
            Ok::<(), anyhow::Error>(())
        })?;

        server.fn_handler("/api/config", Method::Post, move |mut req| {
            let mut body = Vec::new();
            let mut buf = [0u8; 512];
            loop {
                let n = req.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&buf[..n]);
            }
            // Only syntactically valid JSON gets persisted.
            if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
                req.into_status_response(400)?
                    .write_all(b"{\"error\":\"body is not valid JSON\"}")?;
                return Ok::<(), anyhow::Error>(());
            }
            std::fs::write(&path_post, &body)?;
            req.into_ok_response()?
                .write_all(b"{\"result\":\"saved, restart to apply\"}")?;
            Ok::<(), anyhow::Error>(())
        })?;

        info!("HTTPD: config endpoint up");
        self.server = Some(server);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self) -> anyhow::Result<()> {
        info!("HTTPD(sim): config endpoint stub ({})", self.dashboard_path);
        Ok(())
    }
}
