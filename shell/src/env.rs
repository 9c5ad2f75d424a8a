use crate::config::Limits;
use crate::history::History;
use crate::job::JobTable;
use crate::variables::Variables;

/// Mutable state owned by one shell session.
///
/// The environment contains:
/// - `variables`: values for `$NAME` expansion and the `set` builtin.
/// - `jobs`: background pipelines still believed to be running.
/// - `history`: every line read at the prompt, for `history` and `!N`.
/// - `should_exit`: set by the `exit` builtin; the read loop stops once it is true.
///
/// It is passed by reference into the statement driver, the executor and the
/// builtins; nothing here lives in a global.
#[derive(Debug)]
pub struct Environment {
    pub variables: Variables,
    pub jobs: JobTable,
    pub history: History,
    pub should_exit: bool,
}

impl Environment {
    pub fn new(limits: &Limits) -> Self {
        Self {
            variables: Variables::new(),
            jobs: JobTable::new(limits.max_jobs),
            history: History::new(),
            should_exit: false,
        }
    }

    /// Release session state ahead of termination.
    pub fn teardown(&mut self) {
        self.variables.clear();
        self.should_exit = true;
    }
}
