//! The mission state machine. A mission is one execution of a plan: a DAG of
//! stages, each advancing through ready → started → finished (or failed,
//! excluded, skipped). All mutation happens through the operations here; the
//! coordinator runs them inside a store transaction so concurrent updates to
//! the same mission serialize cleanly.

pub mod graph;
pub mod stage;

pub use graph::Graph;
pub use stage::{Stage, StageState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HoustonError, Result};
use crate::model::{null_default, Plan};
use stage::zero_time;

/// Returned for every state-changing call: whether it succeeded, which stages
/// became eligible to run, and whether the mission is now complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub next: Vec<String>,
    #[serde(rename = "complete")]
    pub is_complete: bool,
}

/// A workflow instance. `is_complete` and `graph` are derived views,
/// reconstructed on every load and never serialised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mission {
    #[serde(rename = "i", default)]
    pub id: String,
    /// The plan name this mission was minted from.
    #[serde(rename = "n", default)]
    pub name: String,
    #[serde(rename = "a", default, deserialize_with = "null_default")]
    pub services: Vec<String>,
    #[serde(rename = "s", default, deserialize_with = "null_default")]
    pub stages: Vec<Stage>,
    #[serde(rename = "p", default, deserialize_with = "null_default")]
    pub params: Map<String, Value>,
    #[serde(rename = "t", default, with = "zero_time")]
    pub start: Option<DateTime<Utc>>,
    #[serde(rename = "e", default, with = "zero_time")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip)]
    is_complete: bool,
    #[serde(skip)]
    graph: Graph,
}

impl Mission {
    /// Build a mission directly from stages. Used when lifting plans for
    /// validation.
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        let mut mission = Mission {
            name: name.into(),
            stages,
            ..Mission::default()
        };
        mission.rebuild_derived();
        mission
    }

    /// Lift a plan into a mission: every stage starts `ready` with zero
    /// timestamps. Runs before validation and before persistence.
    pub fn from_plan(plan: &Plan) -> Self {
        let stages = plan
            .stages
            .iter()
            .map(|s| Stage {
                name: s.name.clone(),
                service: s.service.clone(),
                upstream: s.upstream.clone(),
                downstream: s.downstream.clone(),
                params: s.params.clone(),
                ..Stage::default()
            })
            .collect();

        let mut mission = Mission {
            name: plan.name.clone(),
            services: plan.services.clone(),
            params: plan.params.clone(),
            stages,
            ..Mission::default()
        };
        mission.rebuild_derived();
        mission
    }

    /// Parse a mission from its persisted JSON. Runs every time the mission
    /// is loaded for modification.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut mission: Mission = serde_json::from_str(json)?;
        mission.rebuild_derived();
        Ok(mission)
    }

    /// Serialise for persistence and for event payloads.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn rebuild_derived(&mut self) {
        self.graph = Graph::build(&self.stages);
        self.is_complete =
            !self.stages.is_empty() && self.stages.iter().all(|s| s.state.is_terminal());
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn stage_index(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| HoustonError::StageNotFound(name.to_string()))
    }

    pub fn get_stage(&self, name: &str) -> Result<&Stage> {
        Ok(&self.stages[self.stage_index(name)?])
    }

    /// Validate the lifted mission before anything is persisted:
    /// - more than 0 stages
    /// - no duplicate stage names
    /// - all referenced stages exist
    /// - graph is acyclic
    /// - graph is weakly connected (no orphaned stages)
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(HoustonError::PlanValidation(
                "plans must have more than 0 stages".to_string(),
            ));
        }

        let mut names: Vec<&str> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            if names.contains(&stage.name.as_str()) {
                return Err(HoustonError::PlanValidation(format!(
                    "stage name '{}' is not unique",
                    stage.name
                )));
            }
            names.push(&stage.name);
        }

        for stage in &self.stages {
            for u in &stage.upstream {
                if !names.contains(&u.as_str()) {
                    return Err(HoustonError::PlanValidation(format!(
                        "stage '{}' has upstream dependency '{}' which is not defined",
                        stage.name, u
                    )));
                }
            }
            for d in &stage.downstream {
                if !names.contains(&d.as_str()) {
                    return Err(HoustonError::PlanValidation(format!(
                        "stage '{}' has downstream dependency '{}' which is not defined",
                        stage.name, d
                    )));
                }
            }
        }

        if let Some(i) = self.graph.check_cycle() {
            return Err(HoustonError::PlanValidation(format!(
                "stage '{}' is dependent on itself (infinite loop)",
                self.stages[i].name
            )));
        }

        if let Some(i) = self.graph.check_connectivity() {
            return Err(HoustonError::PlanValidation(format!(
                "invalid plan: not contiguous - '{}' cannot be reached from '{}'",
                self.stages[i].name, self.stages[0].name
            )));
        }

        Ok(())
    }

    /// All stages currently eligible to run: ready, with every upstream
    /// dependency satisfied.
    pub fn next(&self) -> Vec<String> {
        self.stages
            .iter()
            .enumerate()
            .filter(|(i, s)| {
                s.state == StageState::Ready && self.graph.are_upstream_finished(&self.stages, *i)
            })
            .map(|(_, s)| s.name.clone())
            .collect()
    }

    /// Marks the mission complete when every stage is finished, excluded, or
    /// skipped. Runs after every transition that can remove a stage from the
    /// active set; the end timestamp is written the first time this trips.
    fn check_complete(&mut self) {
        for stage in &self.stages {
            if !stage.state.is_terminal() {
                self.is_complete = false;
                return;
            }
        }
        self.is_complete = true;
        if self.end.is_none() {
            self.end = Some(Utc::now());
        }
    }

    fn response(&self, success: bool, next: Vec<String>) -> Response {
        Response {
            success,
            next,
            is_complete: self.is_complete,
        }
    }

    /// Start a stage. Allowed from `ready` and `failed` (retry) when all
    /// upstream dependencies are satisfied. With `ignore_dependencies`, every
    /// ancestor is excluded first and the dependency check passes vacuously.
    pub fn start_stage(&mut self, stage_name: &str, ignore_dependencies: bool) -> Result<Response> {
        if self.is_complete {
            return Err(HoustonError::Completed);
        }
        let idx = self.stage_index(stage_name)?;

        match self.stages[idx].state {
            StageState::Ready | StageState::Failed => {}
            StageState::Started => {
                return Err(HoustonError::StageChange(format!(
                    "cannot start stage '{stage_name}' because it has already started - stages can only be started again after they have been marked as failed"
                )));
            }
            StageState::Finished => {
                return Err(HoustonError::StageChange(format!(
                    "cannot start stage '{stage_name}' because it has already finished"
                )));
            }
            StageState::Excluded => {
                return Err(HoustonError::StageChange(format!(
                    "cannot start stage '{stage_name}' because it is being excluded"
                )));
            }
            StageState::Skipped => {
                return Err(HoustonError::StageChange(format!(
                    "cannot start stage '{stage_name}' because it was skipped"
                )));
            }
        }

        if ignore_dependencies {
            // Pre-mark this stage excluded so the upstream walk does not
            // exclude it via a shared descendant, then exclude every ancestor.
            self.stages[idx].state = StageState::Excluded;
            exclude_upstream(&self.graph, &mut self.stages, idx)?;
            self.stages[idx].state = StageState::Ready;
        }

        if !self.graph.are_upstream_finished(&self.stages, idx) {
            // Find the offending dependency for a helpful message.
            let mut err = None;
            for &u in &self.graph.up[idx] {
                match self.stages[u].state {
                    StageState::Finished | StageState::Excluded => continue,
                    StageState::Skipped => {
                        if !self.graph.are_upstream_finished(&self.stages, u) {
                            err = Some(HoustonError::StageChange(format!(
                                "cannot start stage '{stage_name}' because skipped stage '{}' has unfinished upstream dependencies",
                                self.stages[u].name
                            )));
                        }
                    }
                    _ => {
                        err = Some(HoustonError::StageChange(format!(
                            "cannot start stage '{stage_name}' because it has unfinished upstream dependency '{}'",
                            self.stages[u].name
                        )));
                    }
                }
            }
            return Err(err.unwrap_or_else(|| {
                HoustonError::StageChange(format!(
                    "cannot start stage '{stage_name}' because it has unfinished upstream dependencies"
                ))
            }));
        }

        self.stages[idx].state = StageState::Started;
        self.stages[idx].start = Some(Utc::now());

        Ok(self.response(true, Vec::new()))
    }

    /// Finish a started stage. With `ignore_dependencies`, every descendant
    /// is excluded so nothing downstream runs.
    pub fn finish_stage(
        &mut self,
        stage_name: &str,
        ignore_dependencies: bool,
    ) -> Result<Response> {
        if self.is_complete {
            return Err(HoustonError::Completed);
        }
        let idx = self.stage_index(stage_name)?;

        match self.stages[idx].state {
            StageState::Started => {}
            StageState::Excluded | StageState::Skipped | StageState::Ready => {
                return Err(HoustonError::StageChange(format!(
                    "cannot finish stage '{stage_name}' because it has not been started"
                )));
            }
            StageState::Finished => {
                return Err(HoustonError::StageChange(format!(
                    "stage '{stage_name}' is already finished"
                )));
            }
            StageState::Failed => {
                return Err(HoustonError::StageChange(format!(
                    "cannot finish stage '{stage_name}' because it is marked as failed"
                )));
            }
        }

        self.stages[idx].state = StageState::Finished;
        self.stages[idx].end = Some(Utc::now());

        if ignore_dependencies {
            exclude_downstream(&self.graph, &mut self.stages, idx)?;
        }

        let next = self.next();
        if next.is_empty() {
            self.check_complete();
        }

        Ok(self.response(true, next))
    }

    /// Skip a stage so its descendants treat it as satisfied once its own
    /// upstream is satisfied. Idempotent on stages that are already terminal.
    pub fn skip_stage(&mut self, stage_name: &str) -> Result<Response> {
        if self.is_complete {
            return Err(HoustonError::Completed);
        }
        let idx = self.stage_index(stage_name)?;

        match self.stages[idx].state {
            StageState::Ready | StageState::Failed => {
                self.stages[idx].state = StageState::Skipped;
            }
            StageState::Skipped | StageState::Excluded | StageState::Finished => {
                // allowed, state unchanged
            }
            StageState::Started => {
                return Err(HoustonError::StageChange(format!(
                    "cannot skip stage '{stage_name}' because it has previously been started"
                )));
            }
        }

        let next = self.next();
        if next.is_empty() {
            self.check_complete();
        }

        Ok(self.response(true, next))
    }

    /// Mark a started stage as failed so it can be retried or excluded.
    pub fn fail_stage(&mut self, stage_name: &str) -> Result<Response> {
        if self.is_complete {
            return Err(HoustonError::Completed);
        }
        let idx = self.stage_index(stage_name)?;

        match self.stages[idx].state {
            StageState::Started => {}
            state => {
                return Err(HoustonError::StageChange(format!(
                    "cannot fail stage '{stage_name}' because it is {state}, not started"
                )));
            }
        }

        self.stages[idx].state = StageState::Failed;
        Ok(Response {
            success: true,
            next: Vec::new(),
            is_complete: false,
        })
    }

    /// Exclude a stage from the mission, recursively excluding its
    /// descendants. Idempotent on stages that are already terminal.
    pub fn exclude_stage(&mut self, stage_name: &str) -> Result<Response> {
        if self.is_complete {
            return Err(HoustonError::Completed);
        }
        let idx = self.stage_index(stage_name)?;

        try_exclude(&mut self.stages[idx])?;
        exclude_downstream(&self.graph, &mut self.stages, idx)?;

        self.check_complete();
        Ok(self.response(true, Vec::new()))
    }

    /// Text alternative to the mission dashboard: one line per stage with its
    /// state icon and duration.
    pub fn report(&self) -> String {
        let mut out = format!("{}/{}", self.name, self.id);
        if self.is_complete {
            out.push_str(" [complete]");
        }
        out.push('\n');
        for stage in &self.stages {
            out.push_str(&format!(
                "{} {} {}\n",
                stage.state.icon(),
                stage.name,
                stage.duration()
            ));
        }
        out
    }
}

fn try_exclude(stage: &mut Stage) -> Result<()> {
    match stage.state {
        StageState::Ready | StageState::Failed => {
            stage.state = StageState::Excluded;
            Ok(())
        }
        StageState::Finished | StageState::Skipped | StageState::Excluded => {
            // allowed, state unchanged
            Ok(())
        }
        StageState::Started => Err(HoustonError::StageChange(format!(
            "cannot exclude stage '{}' because it is started, not ready",
            stage.name
        ))),
    }
}

fn exclude_downstream(graph: &Graph, stages: &mut [Stage], i: usize) -> Result<()> {
    for d in graph.down[i].clone() {
        if stages[d].state == StageState::Excluded {
            continue; // already seen, don't recurse
        }
        try_exclude(&mut stages[d])?;
        exclude_downstream(graph, stages, d)?;
    }
    Ok(())
}

/// Runs only for `start_stage` with dependencies ignored: excludes every
/// ancestor, and after excluding each one re-walks its downstream so stages
/// that can no longer run are excluded too.
fn exclude_upstream(graph: &Graph, stages: &mut [Stage], i: usize) -> Result<()> {
    for u in graph.up[i].clone() {
        if stages[u].state == StageState::Excluded {
            continue; // already seen, don't recurse
        }
        try_exclude(&mut stages[u])?;
        exclude_upstream(graph, stages, u)?;
        exclude_downstream(graph, stages, u)?;
    }
    Ok(())
}
