//! External SMT solver driver
//!
//! Serializes the slot and constraint set into an SMT problem file, invokes
//! the external solver as a child process, and decodes its output. A
//! non-zero process exit is the solver's way of reporting unsatisfiability
//! and is a first-class result, not an error; the caller may follow up with
//! [`SolverDriver::explain_unsatisfiable`] to obtain an unsat core resolved
//! back to the originating constraints.

use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Write as _;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write as _};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::smt::SmtEncoder;
use crate::encoder::{Encoded, SlotEncoder};
use crate::error::{QualError, Result};
use crate::lattice::{Lattice, Qualifier};
use crate::manager::SlotManager;
use crate::model::{Constraint, ConstraintManager, Location, SlotId};

/// Name of the per-run problem file, truncated on every run
pub const CONSTRAINTS_FILE: &str = "solver_constraints.smt";

/// Name of the append-only file accumulating all runs for offline analysis
pub const CONSTRAINTS_GLOB_FILE: &str = "solver_constraints_glob.smt";

/// Name of the problem file written for an explanation pass
pub const CONSTRAINTS_UNSAT_CORE_FILE: &str = "solver_constraints_unsat_core.smt";

/// Solver driver options
///
/// Plain configuration, not part of the algorithmic contract.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Emit soft preference constraints and solve in optimizing mode
    pub optimizing_mode: bool,
    /// Bounded wait for the external process (None = no timeout)
    pub timeout: Option<Duration>,
    /// Name or path of the external solver executable
    pub solver_program: String,
    /// Directory the problem files are written to
    pub work_dir: PathBuf,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            optimizing_mode: false,
            timeout: None,
            solver_program: "z3".to_string(),
            work_dir: PathBuf::from("."),
        }
    }
}

/// Statistics collected during one solver run
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    serialization_time: Duration,
    solving_time: Duration,
    num_constraints: u32,
    num_trivially_true: u32,
}

impl Statistics {
    /// Returns serialization time in milliseconds
    pub fn serialization_time(&self) -> u64 {
        self.serialization_time.as_millis() as u64
    }

    /// Returns solving time in milliseconds
    pub fn solving_time(&self) -> u64 {
        self.solving_time.as_millis() as u64
    }

    /// Returns the number of hard constraints serialized
    pub fn num_constraints(&self) -> u32 {
        self.num_constraints
    }

    /// Returns the number of constraints dropped as trivially true
    pub fn num_trivially_true(&self) -> u32 {
        self.num_trivially_true
    }
}

/// A decoded satisfying assignment
///
/// Maps every variable slot referenced by at least one constraint to its
/// solved lattice value. Slots absent from the map are unconstrained and
/// default to the lattice top.
#[derive(Debug, Clone)]
pub struct Solution {
    assignments: FxHashMap<SlotId, Qualifier>,
    lattice: Lattice,
    stats: Statistics,
}

impl Solution {
    pub(crate) fn new(lattice: Lattice) -> Self {
        Self {
            assignments: FxHashMap::default(),
            lattice,
            stats: Statistics::default(),
        }
    }

    pub(crate) fn assign(&mut self, id: SlotId, value: Qualifier) {
        self.assignments.insert(id, value);
    }

    pub(crate) fn set_statistics(&mut self, stats: Statistics) {
        self.stats = stats;
    }

    /// Returns the solved value for the slot, defaulting to the lattice top
    /// for unconstrained slots
    pub fn value_of(&self, id: SlotId) -> Qualifier {
        self.assignments
            .get(&id)
            .copied()
            .unwrap_or_else(|| self.lattice.top())
    }

    /// Returns the solved value for the slot, if it was constrained
    pub fn get(&self, id: SlotId) -> Option<Qualifier> {
        self.assignments.get(&id).copied()
    }

    /// Returns the full slot-to-value map
    pub fn assignments(&self) -> &FxHashMap<SlotId, Qualifier> {
        &self.assignments
    }

    /// Returns the statistics of the run that produced this solution
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }
}

struct Serialized {
    contents: String,
    named: FxHashMap<String, Constraint>,
    referenced: FxHashSet<SlotId>,
    num_constraints: u32,
    num_trivially_true: u32,
}

/// Drives the external SMT solver over a slot and constraint set
pub struct SolverDriver {
    options: DriverOptions,
    lattice: Lattice,
}

impl SolverDriver {
    /// Creates a driver with the given options and lattice
    pub fn new(options: DriverOptions, lattice: Lattice) -> Self {
        Self { options, lattice }
    }

    /// Solves the constraint set with the external solver
    ///
    /// Returns `None` when the solver reports unsatisfiability (a non-zero
    /// process exit). On success, the decoded solution maps every variable
    /// slot referenced by at least one constraint.
    ///
    /// # Errors
    /// Fails if a hard constraint simplifies to false during encoding, the
    /// solver process cannot be launched, or its output cannot be parsed.
    pub fn solve(
        &self,
        manager: &SlotManager,
        constraints: &[Constraint],
    ) -> Result<Option<Solution>> {
        let serialization_start = Instant::now();
        let serialized = self.serialize(manager, constraints, false)?;
        let serialization_time = serialization_start.elapsed();

        let problem_path = self.options.work_dir.join(CONSTRAINTS_FILE);
        self.write_problem(&problem_path, &serialized.contents)?;

        info!("invoking {} on {}", self.options.solver_program, problem_path.display());
        let solving_start = Instant::now();
        let (status, lines) = self.run_solver(&problem_path)?;
        let solving_time = solving_start.elapsed();

        let stats = Statistics {
            serialization_time,
            solving_time,
            num_constraints: serialized.num_constraints,
            num_trivially_true: serialized.num_trivially_true,
        };
        debug!(
            "solver finished: exit {:?}, {} constraints, {} trivially true, {} ms",
            status.code(),
            stats.num_constraints(),
            stats.num_trivially_true(),
            stats.solving_time()
        );

        if !status.success() {
            // non-zero exit is the solver reporting unsatisfiability
            info!("constraint set is unsatisfiable");
            return Ok(None);
        }

        let model = parse_model(&lines)?;
        let mut solution = Solution::new(self.lattice.clone());
        solution.set_statistics(stats);
        for (id, raw) in model {
            let id = SlotId(id);
            if !serialized.referenced.contains(&id) {
                continue;
            }
            let value = usize::try_from(raw).ok().ok_or_else(|| {
                QualError::MalformedOutput(format!("negative qualifier index {} for slot {}", raw, id))
            })?;
            let qualifier = self.lattice.qualifier_at(value).map_err(|_| {
                QualError::MalformedOutput(format!(
                    "qualifier index {} for slot {} out of lattice range",
                    value, id
                ))
            })?;
            solution.assign(id, qualifier);
        }
        Ok(Some(solution))
    }

    /// Re-serializes the identical constraint set requesting an unsat core
    /// and resolves the returned assertion names back to their originating
    /// constraints
    ///
    /// Returns an empty set when the solver does not report an unsat core
    /// (the constraint set was satisfiable after all).
    ///
    /// # Errors
    /// Fails if a hard constraint simplifies to false during encoding or
    /// the solver process cannot be launched.
    pub fn explain_unsatisfiable(
        &self,
        manager: &SlotManager,
        constraints: &[Constraint],
    ) -> Result<Vec<Constraint>> {
        let serialized = self.serialize(manager, constraints, true)?;

        let problem_path = self.options.work_dir.join(CONSTRAINTS_UNSAT_CORE_FILE);
        self.write_problem(&problem_path, &serialized.contents)?;

        info!("invoking {} for unsat core", self.options.solver_program);
        let (_status, lines) = self.run_solver(&problem_path)?;

        let names = parse_unsat_core(&lines);
        if names.is_empty() {
            warn!("solver reported no unsat core; constraint set may be satisfiable");
            return Ok(Vec::new());
        }

        let mut implicated = Vec::new();
        for name in names {
            match serialized.named.get(&name) {
                Some(constraint) => implicated.push(constraint.clone()),
                None => warn!("unsat core names unknown assertion {}", name),
            }
        }
        Ok(implicated)
    }

    /// Serializes slots and constraints into SMT problem-file contents
    fn serialize(
        &self,
        manager: &SlotManager,
        constraints: &[Constraint],
        unsat_core: bool,
    ) -> Result<Serialized> {
        let mut encoder = SmtEncoder::new(self.lattice.clone());
        let constraint_manager = ConstraintManager::new(self.lattice.clone());
        let mut contents = String::new();

        if unsat_core {
            contents.push_str("(set-option :produce-unsat-cores true)\n");
        }

        // one declaration plus one well-formedness constraint per variable
        // slot; in optimizing mode also one soft preference per slot
        for slot in manager.variable_slots() {
            let _ = writeln!(contents, "{}", encoder.declaration(slot));
            let _ = writeln!(contents, "(assert {})", encoder.encode_wellformedness(slot));
            if self.options.optimizing_mode && !unsat_core {
                if let Some(preference) = encoder.encode_preference(slot) {
                    let _ = writeln!(contents, "(assert-soft {} :weight 1)", preference);
                }
            }
        }

        let mut named = FxHashMap::default();
        let mut referenced = FxHashSet::default();
        let mut num_constraints = 0u32;
        let mut num_trivially_true = 0u32;
        let mut current = 1usize;

        for constraint in constraints {
            let formula = match constraint.serialize::<_, String>(&mut encoder) {
                Encoded::TriviallyTrue => {
                    num_trivially_true += 1;
                    current += 1;
                    continue;
                }
                Encoded::TriviallyFalse => {
                    return Err(QualError::ImpossibleConstraint(constraint.to_string()));
                }
                Encoded::Unsupported => {
                    warn!(
                        "smt backend cannot encode {}: {}",
                        constraint.kind_name(),
                        constraint
                    );
                    continue;
                }
                Encoded::Value(formula) => formula,
            };

            if formula == "true" {
                num_trivially_true += 1;
                current += 1;
                continue;
            }
            if formula == "false" {
                return Err(QualError::ImpossibleConstraint(constraint.to_string()));
            }

            if unsat_core {
                // named assertions resolve core entries back to constraints
                let name = format!("{}{}", constraint.kind_name(), current);
                let _ = writeln!(contents, "(assert (! {} :named {}))", formula, name);
                named.insert(name, constraint.clone());
            } else {
                let _ = writeln!(contents, "(assert {})", formula);
            }

            // prefer operand equality for subtype and comparable relations
            // when optimizing
            if self.options.optimizing_mode && !unsat_core {
                let soft = match constraint {
                    Constraint::Subtype {
                        subtype, supertype, ..
                    } => Some(constraint_manager.equality(
                        subtype.clone(),
                        supertype.clone(),
                        Location::missing(),
                    )),
                    Constraint::Comparable { left, right, .. } => Some(constraint_manager.equality(
                        left.clone(),
                        right.clone(),
                        Location::missing(),
                    )),
                    _ => None,
                };
                if let Some(soft) = soft {
                    if let Encoded::Value(soft_formula) = soft.serialize::<_, String>(&mut encoder)
                    {
                        if soft_formula != "true" {
                            let _ = writeln!(contents, "(assert-soft {} :weight 1)", soft_formula);
                        }
                    }
                }
            }

            for slot in constraint.slots() {
                if slot.is_variable() {
                    referenced.insert(slot.id());
                }
            }
            num_constraints += 1;
            current += 1;
        }

        contents.push_str("(check-sat)\n");
        if unsat_core {
            contents.push_str("(get-unsat-core)\n");
        } else {
            contents.push_str("(get-model)\n");
        }

        Ok(Serialized {
            contents,
            named,
            referenced,
            num_constraints,
            num_trivially_true,
        })
    }

    /// Writes the problem file and appends a copy to the accumulation file
    fn write_problem(&self, path: &std::path::Path, contents: &str) -> Result<()> {
        fs::write(path, contents)?;
        let glob_path = self.options.work_dir.join(CONSTRAINTS_GLOB_FILE);
        let mut glob = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(glob_path)?;
        glob.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Runs the external solver on the given problem file
    ///
    /// Standard output and standard error are drained on separate reader
    /// threads so large output cannot deadlock the pipes. The optional
    /// timeout kills the child process; killing it is the only cancellation
    /// primitive.
    fn run_solver(&self, problem_path: &std::path::Path) -> Result<(ExitStatus, Vec<String>)> {
        let mut child = Command::new(&self.options.solver_program)
            .arg(problem_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                QualError::SolverProcess(format!(
                    "failed to launch {}: {}",
                    self.options.solver_program, e
                ))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            QualError::SolverProcess("no stdout handle on solver process".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            QualError::SolverProcess("no stderr handle on solver process".to_string())
        })?;

        let stdout_reader = thread::spawn(move || -> std::io::Result<Vec<String>> {
            BufReader::new(stdout).lines().collect()
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf);
            buf
        });

        let status = match self.options.timeout {
            None => child.wait().map_err(|e| {
                QualError::SolverProcess(format!("failed to wait for solver: {}", e))
            })?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break status,
                        Ok(None) => {
                            if Instant::now() >= deadline {
                                let _ = child.kill();
                                let _ = child.wait();
                                return Err(QualError::SolverProcess(format!(
                                    "solver exceeded timeout of {} ms",
                                    timeout.as_millis()
                                )));
                            }
                            thread::sleep(Duration::from_millis(10));
                        }
                        Err(e) => {
                            return Err(QualError::SolverProcess(format!(
                                "failed to wait for solver: {}",
                                e
                            )));
                        }
                    }
                }
            }
        };

        let lines = stdout_reader
            .join()
            .map_err(|_| QualError::SolverProcess("stdout reader panicked".to_string()))?
            .map_err(|e| QualError::SolverProcess(format!("failed to read solver output: {}", e)))?;
        let errors = stderr_reader
            .join()
            .map_err(|_| QualError::SolverProcess("stderr reader panicked".to_string()))?;
        if !errors.trim().is_empty() {
            debug!("solver stderr: {}", errors.trim());
        }

        Ok((status, lines))
    }
}

/// Parses a model listing into `(slot id, raw value)` pairs
///
/// Each `(define-fun |id| ...)` declaration line is paired with the
/// following line carrying the assigned value. Negative values arrive
/// wrapped as `(- n)` and are sign-normalized.
fn parse_model(lines: &[String]) -> Result<Vec<(u32, i64)>> {
    let mut results = Vec::new();
    let mut pending: Option<u32> = None;

    for raw in lines {
        let line = raw.trim();
        match pending {
            None => {
                if !line.starts_with("(define-fun") {
                    continue;
                }
                let first_bar = line.find('|');
                let last_bar = line.rfind('|');
                let (first_bar, last_bar) = match (first_bar, last_bar) {
                    (Some(f), Some(l)) if f < l => (f, l),
                    _ => {
                        return Err(QualError::MalformedOutput(format!(
                            "declaration line without a quoted name: {}",
                            line
                        )));
                    }
                };
                if !line.contains("Int") && !line.contains("Bool") {
                    return Err(QualError::MalformedOutput(format!(
                        "declaration line with unexpected sort: {}",
                        line
                    )));
                }
                let name = &line[first_bar + 1..last_bar];
                let id = name.parse::<u32>().map_err(|_| {
                    QualError::MalformedOutput(format!("non-numeric slot name {}", name))
                })?;
                pending = Some(id);
            }
            Some(id) => {
                let close = line.rfind(')').ok_or_else(|| {
                    QualError::MalformedOutput(format!("unterminated value line: {}", line))
                })?;
                let mut value = line[..close].trim().to_string();
                if value.contains('-') {
                    // remove brackets around the negative number and the
                    // space between the sign and the digits
                    value = value
                        .chars()
                        .filter(|c| c.is_ascii_digit() || *c == '-')
                        .collect();
                }
                let parsed = value.parse::<i64>().map_err(|_| {
                    QualError::MalformedOutput(format!("unparsable value line: {}", raw))
                })?;
                results.push((id, parsed));
                pending = None;
            }
        }
    }

    if pending.is_some() {
        return Err(QualError::MalformedOutput(
            "declaration line without a value line".to_string(),
        ));
    }
    Ok(results)
}

/// Parses an unsat-core listing into the assertion names it contains
///
/// Names follow the line reading `unsat`, wrapped in a single pair of
/// parentheses.
fn parse_unsat_core(lines: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    let mut unsat = false;
    for raw in lines {
        let mut line = raw.trim();
        if !unsat {
            unsat = line == "unsat";
            continue;
        }
        line = line.strip_prefix('(').unwrap_or(line);
        line = line.strip_suffix(')').unwrap_or(line);
        names.extend(line.split_whitespace().map(str::to_string));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_model_pairs_declarations_with_values() {
        let output = lines(&[
            "sat",
            "(",
            "  (define-fun |3| () Int",
            "    1)",
            "  (define-fun |1| () Int",
            "    0)",
            ")",
        ]);
        let model = parse_model(&output).unwrap();
        assert_eq!(model, vec![(3, 1), (1, 0)]);
    }

    #[test]
    fn parse_model_normalizes_negative_values() {
        let output = lines(&[
            "sat",
            "(",
            "  (define-fun |7| () Int",
            "    (- 2))",
            ")",
        ]);
        let model = parse_model(&output).unwrap();
        assert_eq!(model, vec![(7, -2)]);
    }

    #[test]
    fn parse_model_rejects_garbage() {
        let output = lines(&["sat", "(", "  (define-fun no-name () Int", "    0)", ")"]);
        assert!(matches!(
            parse_model(&output),
            Err(QualError::MalformedOutput(_))
        ));

        let dangling = lines(&["sat", "(define-fun |1| () Int"]);
        assert!(matches!(
            parse_model(&dangling),
            Err(QualError::MalformedOutput(_))
        ));
    }

    #[test]
    fn parse_unsat_core_extracts_names() {
        let output = lines(&["unsat", "(SubtypeConstraint1 EqualityConstraint4)"]);
        assert_eq!(
            parse_unsat_core(&output),
            vec!["SubtypeConstraint1", "EqualityConstraint4"]
        );
    }

    #[test]
    fn parse_unsat_core_without_unsat_is_empty() {
        let output = lines(&["sat", "(model stuff)"]);
        assert!(parse_unsat_core(&output).is_empty());
    }

    #[test]
    fn parse_unsat_core_multiline() {
        let output = lines(&["unsat", "(SubtypeConstraint1", "ComparableConstraint2)"]);
        assert_eq!(
            parse_unsat_core(&output),
            vec!["SubtypeConstraint1", "ComparableConstraint2"]
        );
    }
}
