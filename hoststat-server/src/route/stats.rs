use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use hoststat_proto::{Code, Envelope};
use serde::Serialize;
use tracing::debug;

use crate::{
    AppState,
    query::{QueryError, Reading, StatKind},
};

pub const STATS_PREFIX: &str = "/stats/";
const WRONG_DATA_TYPE: &str = "wrong data type";

/// Body of the `data` field: a reading on success, otherwise a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Reading(Reading),
    Message(String),
}

/// Serves `/stats/<kind>`. Every outcome is HTTP 200; failures are reported
/// through the envelope code.
///
/// The key is percent-decoded. A bare `/stats/` or an undecodable key is
/// treated as an unknown kind.
pub async fn stats(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> Json<Envelope<Payload>> {
    let key = key.map(|Path(key)| key).unwrap_or_default();
    let boot_offset = state.boot_offset;
    Json(dispatch(&key, move |kind| kind.query(boot_offset)).await)
}

/// Resolves `key` and runs its collector on the blocking pool, so a slow OS
/// query only holds up its own request.
pub(crate) async fn dispatch<F>(key: &str, query: F) -> Envelope<Payload>
where
    F: FnOnce(StatKind) -> Result<Reading, QueryError> + Send + 'static,
{
    let Ok(kind) = key.parse::<StatKind>() else {
        debug!(key, "unknown stat kind");
        return Envelope::new(
            Code::WrongArguments,
            Payload::Message(WRONG_DATA_TYPE.to_owned()),
        );
    };

    debug!(?kind, "querying stats");
    let res = tokio::task::spawn_blocking(move || query(kind))
        .await
        .unwrap_or_else(|e| Err(e.into()));
    match res {
        Ok(reading) => Envelope::success(Payload::Reading(reading)),
        Err(e) => Envelope::new(Code::NoData, Payload::Message(e.to_string())),
    }
}
