use serde::{Deserialize, Serialize, Serializer};
use time::macros::format_description;
use time::OffsetDateTime;

/// TestRail result status. Discriminants are the service's `status_id` values.
/// Only `Passed` and `Failed` are produced from runner events.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Passed = 1,
    Blocked = 2,
    Untested = 3,
    Retest = 4,
    Failed = 5,
}

impl Status {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.id())
    }
}

/// One outcome for one TestRail case, as published in `add_results_for_cases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub case_id: u64,
    #[serde(rename = "status_id")]
    pub status: Status,
    pub comment: String,
}

/// Failure detail attached to a `fail` event. `json-stream` flattens it to the message,
/// other emitters keep the error object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TestError {
    Message(String),
    Detailed {
        #[serde(default)]
        message: String,
    },
}

impl TestError {
    pub fn message(&self) -> &str {
        match self {
            TestError::Message(m) => m,
            TestError::Detailed { message } => message,
        }
    }
}

/// Test metadata carried by `pass`/`fail` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestInfo {
    pub title: String,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub err: Option<TestError>,
}

/// Lifecycle events delivered by the host test runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    Start,
    Pass(TestInfo),
    Fail(TestInfo),
    End,
}

/// Local view of the remote run: naming plus every result accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct RunDescriptor {
    pub name: String,
    pub description: String,
    results: Vec<CaseResult>,
}

impl RunDescriptor {
    /// Name and describe a run for `build`, stamped with `at`.
    pub fn for_build(build: &str, label: &str, at: OffsetDateTime) -> Self {
        let stamp_format = format_description!(
            "[year]-[month]-[day], [hour]:[minute] ([offset_hour sign:mandatory]:[offset_minute])"
        );
        let stamp = at
            .format(stamp_format)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        Self {
            name: format!("{stamp} , {label}, Travis Build: #{build}"),
            description: format!("Travis Build Number: {build}"),
            results: Vec::new(),
        }
    }

    /// Append one result per case id, all sharing `status` and `comment`.
    pub fn record(&mut self, case_ids: &[u64], status: Status, comment: &str) {
        self.results.extend(case_ids.iter().map(|&case_id| CaseResult {
            case_id,
            status,
            comment: comment.to_string(),
        }));
    }

    pub fn results(&self) -> &[CaseResult] {
        &self.results
    }

    /// Distinct case ids referenced by the results, in first-seen order.
    pub fn case_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = Vec::with_capacity(self.results.len());
        for r in &self.results {
            if !ids.contains(&r.case_id) {
                ids.push(r.case_id);
            }
        }
        ids
    }
}
