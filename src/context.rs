//! Invocation environment and session
//!
//! `Env` captures everything an invocation computes from exactly once:
//! the configuration, the clock, the date parser and the urgency
//! coefficient snapshot. `Session` owns the loaded task database and
//! offers the filtered views commands work against. There are no
//! process-wide statics; both are threaded explicitly.

use chrono::{DateTime, Utc};

use crate::config::Configuration;
use crate::date::DateParser;
use crate::error::TaskError;
use crate::expr::{EvalContext, Filter, Selector};
use crate::storage::TaskDb;
use crate::task::Task;
use crate::urgency::UrgencySnapshot;

/// Per-invocation environment. The clock is read once, here, and every
/// component computes from the same instant.
#[derive(Debug, Clone)]
pub struct Env {
    pub config: Configuration,
    pub now: DateTime<Utc>,
    pub date_parser: DateParser,
    pub urgency: UrgencySnapshot,
}

impl Env {
    /// Build an environment for the current instant.
    pub fn new(config: Configuration) -> Self {
        Self::at(config, Utc::now())
    }

    /// Build an environment with an explicit clock. Tests and the
    /// recurrence scenarios depend on this being deterministic.
    pub fn at(config: Configuration, now: DateTime<Utc>) -> Self {
        let mut date_parser = DateParser::new();
        date_parser.set_format(&config.date_format());
        date_parser.set_weekstart(config.weekstart());
        let urgency = UrgencySnapshot::from_config(&config);
        Self {
            config,
            now,
            date_parser,
            urgency,
        }
    }

    /// The evaluation context filters run under.
    pub fn eval_context(&self) -> EvalContext<'_> {
        EvalContext {
            now: self.now,
            parser: &self.date_parser,
            config: &self.config,
        }
    }
}

/// One invocation's working state: environment plus loaded database.
#[derive(Debug)]
pub struct Session {
    pub env: Env,
    pub db: TaskDb,
}

impl Session {
    pub fn new(env: Env) -> Self {
        let db = TaskDb::new(&env.config);
        Self { env, db }
    }

    /// Load the pending set (waiting reconciliation and recurrence
    /// included). Attributes present on tasks but missing from the UDA
    /// schema are tolerated and reported through the log.
    pub fn load(&mut self) -> Result<(), TaskError> {
        self.db.load(self.env.now, self.env.config.recurrence())?;

        let schema = self.env.config.uda_schema()?;
        let mut orphans: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for task in self.db.pending_tasks() {
            for name in task.uda_names() {
                if !schema.contains_key(name) {
                    orphans.insert(name.to_string());
                }
            }
        }
        for name in orphans {
            log::warn!("orphan UDA '{name}' present on tasks but not declared in configuration");
        }
        Ok(())
    }

    /// Persist outstanding changes.
    pub fn commit(&mut self) -> Result<(), TaskError> {
        self.db.commit(self.env.now)
    }

    /// Evaluate a filter over the pending set. Sequence-only filters
    /// short-circuit to an ID/UUID whitelist without evaluating the
    /// expression machinery per task.
    pub fn filtered_pending(&self, filter: &Filter) -> Result<Vec<Task>, TaskError> {
        if let Some(selectors) = filter.sequence() {
            return Ok(self.select_by_sequence(selectors, self.db.pending_tasks()));
        }

        let ctx = self.env.eval_context();
        let mut result = Vec::new();
        for task in self.db.pending_tasks() {
            if filter.matches(task, &ctx)? {
                result.push(task.clone());
            }
        }
        Ok(result)
    }

    /// Evaluate a filter over pending plus completed tasks. The caller
    /// must have loaded the completed file first.
    pub fn filtered_all(&self, filter: &Filter) -> Result<Vec<Task>, TaskError> {
        if let Some(selectors) = filter.sequence() {
            let all: Vec<Task> = self.db.all_tasks().cloned().collect();
            return Ok(self.select_by_sequence(selectors, &all));
        }

        let ctx = self.env.eval_context();
        let mut result = Vec::new();
        for task in self.db.all_tasks() {
            if filter.matches(task, &ctx)? {
                result.push(task.clone());
            }
        }
        Ok(result)
    }

    fn select_by_sequence(&self, selectors: &[Selector], tasks: &[Task]) -> Vec<Task> {
        tasks
            .iter()
            .filter(|task| {
                selectors.iter().any(|selector| match selector {
                    Selector::Id(id) => task.id() == *id,
                    Selector::IdRange(low, high) => {
                        task.id() > 0 && (*low..=*high).contains(&task.id())
                    }
                    Selector::Uuid(uuid) => task.uuid() == Some(*uuid),
                })
            })
            .cloned()
            .collect()
    }

    /// Urgency of a task within the current working set.
    pub fn urgency_of(&self, task: &Task) -> f64 {
        crate::urgency::urgency(
            task,
            self.db.pending_tasks(),
            &self.env.urgency,
            self.env.now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        let mut config = Configuration::default();
        config.data_dir = dir.path().to_path_buf();
        let env = Env::at(
            config,
            Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap(),
        );
        Session::new(env)
    }

    #[test]
    fn sequence_fast_path_matches_evaluated_path() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        s.load().unwrap();
        for i in 0..5 {
            s.db.add_task(Task::new(&format!("task {i}"), s.env.now));
        }

        let filter = Filter::parse(&["2,4".to_string()]).unwrap();
        assert!(filter.sequence().is_some());
        let fast = s.filtered_pending(&filter).unwrap();
        assert_eq!(fast.len(), 2);
        let ids: Vec<u32> = fast.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn env_parser_honors_config() {
        let mut config = Configuration::default();
        config.set("dateformat", "Y-M-D");
        config.set("weekstart", "monday");
        let env = Env::at(
            config,
            Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap(),
        );
        use crate::date::DateParsing;
        let parsed = env
            .date_parser
            .parse_date("2024-03-05", env.now)
            .unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
        );
    }
}
