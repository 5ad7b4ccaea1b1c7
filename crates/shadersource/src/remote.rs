use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use crate::future::SourceFuture;
use crate::{non_empty, SourceError};

/// Downloads a fragment program, blocking the calling thread.
pub fn fetch_program(url: &Url, timeout: Duration) -> Result<String, SourceError> {
    let fetch_error = |message: String| SourceError::Fetch {
        url: url.to_string(),
        message,
    };

    let http = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| fetch_error(err.to_string()))?;
    tracing::debug!(%url, ?timeout, "fetching fragment program");
    let response = http
        .get(url.clone())
        .send()
        .map_err(|err| fetch_error(err.to_string()))?
        .error_for_status()
        .map_err(|err| fetch_error(err.to_string()))?;
    let body = response.text().map_err(|err| fetch_error(err.to_string()))?;
    non_empty(body, url.as_str())
}

/// Runs [`fetch_program`] on a worker thread.
pub(crate) fn spawn_fetch(url: Url, timeout: Duration) -> SourceFuture {
    let (sender, receiver) = mpsc::channel();
    let origin = url.to_string();
    let spawned = thread::Builder::new()
        .name("backdrop-fetch".into())
        .spawn(move || {
            let result = fetch_program(&url, timeout);
            if let Err(err) = &result {
                tracing::warn!(error = %err, "remote fragment program unavailable");
            }
            // The receiver may already have given up after its own deadline.
            let _ = sender.send(result);
        });

    match spawned {
        Ok(_) => SourceFuture::pending(receiver, origin, timeout),
        Err(err) => SourceFuture::ready(Err(SourceError::Fetch {
            url: origin,
            message: format!("failed to spawn fetch worker: {err}"),
        })),
    }
}
