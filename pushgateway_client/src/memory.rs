//! In-memory [`Aggregator`] with Pushgateway semantics.
//!
//! A push replaces every series of its group, a delete removes exactly the
//! addressed group, and the exposition lists all series with their `job` and
//! `instance` labels attached, the way the real gateway renders them.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    client::Aggregator,
    errors::GatewayError,
    exposition::{Sample, parse_exposition},
    grouping::GroupKey,
};

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<GroupKey, Vec<Sample>>,
    pushes: Vec<(GroupKey, usize)>,
    deletes: Vec<GroupKey>,
}

#[derive(Debug)]
pub struct InMemoryGateway {
    state: Mutex<State>,
    wipe_status: StatusCode,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// A gateway without the admin API (wipe answers 404).
    pub fn new() -> Self {
        Self::with_wipe_status(StatusCode::NOT_FOUND)
    }

    /// A gateway whose admin wipe answers `status`; 200 clears everything.
    pub fn with_wipe_status(status: StatusCode) -> Self {
        Self {
            state: Mutex::new(State::default()),
            wipe_status: status,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Series currently held under `key`.
    pub fn series(&self, key: &GroupKey) -> Vec<Sample> {
        self.state().groups.get(key).cloned().unwrap_or_default()
    }

    pub fn groups(&self) -> Vec<GroupKey> {
        self.state().groups.keys().cloned().collect()
    }

    /// Every push received, as (group, number of series in the payload).
    pub fn pushes(&self) -> Vec<(GroupKey, usize)> {
        self.state().pushes.clone()
    }

    pub fn deletes(&self) -> Vec<GroupKey> {
        self.state().deletes.clone()
    }
}

#[async_trait]
impl Aggregator for InMemoryGateway {
    async fn push(&self, key: &GroupKey, payload: String) -> Result<(), GatewayError> {
        let series: Vec<Sample> = parse_exposition(&payload).collect();
        let mut state = self.state();
        state.pushes.push((key.clone(), series.len()));
        state.groups.insert(key.clone(), series);
        Ok(())
    }

    async fn delete(&self, key: &GroupKey) -> Result<StatusCode, GatewayError> {
        let mut state = self.state();
        state.deletes.push(key.clone());
        Ok(match state.groups.remove(key) {
            Some(_) => StatusCode::ACCEPTED,
            None => StatusCode::NOT_FOUND,
        })
    }

    async fn admin_wipe(&self) -> Result<StatusCode, GatewayError> {
        if self.wipe_status == StatusCode::OK {
            self.state().groups.clear();
        }
        Ok(self.wipe_status)
    }

    async fn fetch_exposition(&self) -> Result<String, GatewayError> {
        let state = self.state();
        let mut out = String::new();
        for (key, series) in &state.groups {
            for sample in series {
                let mut sample = sample.clone();
                sample.labels.insert("job".into(), key.job.clone());
                if let Some(instance) = &key.instance {
                    sample.labels.insert("instance".into(), instance.clone());
                }
                out.push_str(&sample.to_line());
                out.push('\n');
            }
        }
        Ok(out)
    }
}
