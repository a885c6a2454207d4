//! Server-sent events endpoint for live notifications.
//!
//! Each request opens a [`PushSession`] for the caller and streams its frames
//! until the session closes. When the client goes away the response stream,
//! and with it the session, is dropped; the session's cleanup then runs in
//! the background.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use rescue_events::PushSession;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/v1/notifications/subscribe
///
/// Opens the caller's push stream. The first event is the handshake; every
/// later event carries one notification as JSON. Event ids are the
/// recipient identity.
pub async fn subscribe(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = PushSession::open(state.relay.clone(), &auth.recipient, state.config.push).await?;

    let events = stream::unfold(session, |mut session| async move {
        let frame = session.next_frame().await?;
        let event = Event::default().id(frame.id).data(frame.data);
        Some((Ok(event), session))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
