use crossbeam_channel::{Receiver, never, select};
use magick_bridge::ProgressEvent;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::host::HostMessage;

/// Feeds every progress event posted to `port` into `on_event` until the
/// job reports on `done`, then drains what is still queued.
///
/// A `done` channel that closes without a result means the job thread died.
/// Once `messages` disconnects only `done` is waited on.
pub fn pump<T, F>(
    messages: &Receiver<HostMessage>,
    done: &Receiver<Result<T, AppError>>,
    port: i64,
    mut on_event: F,
) -> Result<T, AppError>
where
    F: FnMut(ProgressEvent),
{
    let closed = never();
    let mut open = true;
    loop {
        let inbox = if open { messages } else { &closed };
        select! {
            recv(inbox) -> message => match message {
                Ok(message) => dispatch(&message, port, &mut on_event),
                Err(_) => {
                    debug!("host message channel closed, waiting for the job");
                    open = false;
                }
            },
            recv(done) -> result => {
                for message in messages.try_iter() {
                    dispatch(&message, port, &mut on_event);
                }
                return result.unwrap_or(Err(AppError::JobPanicked));
            }
        }
    }
}

fn dispatch<F>(message: &HostMessage, port: i64, on_event: &mut F)
where
    F: FnMut(ProgressEvent),
{
    if message.port != port {
        debug!(port = message.port, "message for another port");
        return;
    }
    match serde_json::from_str::<ProgressEvent>(&message.payload) {
        Ok(event) => on_event(event),
        Err(e) => warn!(error = %e, payload = %message.payload, "malformed progress message"),
    }
}
