// MIT License
// Copyright 2026--present ipidrv developers

//! Evaluator backed by the Gaussian quantum-chemistry program.
//!
//! Each step writes `tmp.gjf` from a template, runs the executable on it in
//! the working directory, and reads energy and forces back from `tmp.log`.
//! The template must request forces (`# force ...`) and contain a line with
//! the `[coord]` placeholder, which is replaced by one line per atom in Å.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{DriverError, Result};
use crate::evaluator::{Evaluation, Evaluator};
use crate::model::Configuration;
use crate::units;

const COORD_PLACEHOLDER: &str = "[coord]";
const INPUT_FILE: &str = "tmp.gjf";
const LOG_FILE: &str = "tmp.log";
const SCF_MARKER: &str = "SCF Done:";
const ENERGY_MARKER: &str = "Energy=";
const FORCES_MARKER: &str = "Forces (Hartrees/Bohr)";
/// Lines between the forces banner and the first atom row.
const FORCES_OFFSET: usize = 3;

pub struct Gaussian {
    template: String,
    atoms: Vec<String>,
    executable: PathBuf,
    workdir: PathBuf,
}

impl Gaussian {
    pub fn new(
        template: impl Into<String>,
        atoms: Vec<String>,
        executable: impl Into<PathBuf>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            template: template.into(),
            atoms,
            executable: executable.into(),
            workdir: workdir.into(),
        }
    }

    /// Read the input template from `path`.
    pub fn from_template_file(
        path: &Path,
        atoms: Vec<String>,
        executable: impl Into<PathBuf>,
        workdir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let template = fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("cannot read template {}: {e}", path.display()))
        })?;
        Ok(Self::new(template, atoms, executable, workdir))
    }

    /// Render the input deck for `positions_angstrom`.
    pub fn render_input(&self, positions_angstrom: &[[f64; 3]]) -> String {
        let mut out = String::with_capacity(self.template.len());
        for line in self.template.split_inclusive('\n') {
            if line.contains(COORD_PLACEHOLDER) {
                for (symbol, x) in self.atoms.iter().zip(positions_angstrom) {
                    out.push_str(&format!(
                        "{} {:16.8} {:16.8} {:16.8}\n",
                        symbol, x[0], x[1], x[2]
                    ));
                }
            } else {
                out.push_str(line);
            }
        }
        out
    }

    fn run(&self) -> Result<()> {
        debug!(exe = %self.executable.display(), "running gaussian");
        let status = Command::new(&self.executable)
            .arg(INPUT_FILE)
            .current_dir(&self.workdir)
            .status()
            .map_err(|e| {
                DriverError::Evaluator(format!(
                    "failed to launch {}: {e}",
                    self.executable.display()
                ))
            })?;
        if !status.success() {
            return Err(DriverError::Evaluator(format!(
                "{} exited with {status}",
                self.executable.display()
            )));
        }
        Ok(())
    }
}

/// Extract the energy (Hartree) and gradient (Hartree/Bohr) from a log.
///
/// The energy comes from the last `SCF Done:` line, or the last `Energy=`
/// line for methods that do not print one. The gradient is the negated block
/// following the first `Forces (Hartrees/Bohr)` banner.
pub fn parse_log(text: &str, n_atoms: usize) -> Result<(f64, Vec<[f64; 3]>)> {
    let lines: Vec<&str> = text.lines().collect();

    let energy = match lines.iter().rev().find(|l| l.contains(SCF_MARKER)) {
        Some(line) => field(line, 4)?,
        None => {
            let line = lines
                .iter()
                .rev()
                .find(|l| l.contains(ENERGY_MARKER))
                .ok_or_else(|| DriverError::Evaluator("no energy found in log".into()))?;
            field(line, 1)?
        }
    };

    let banner = lines
        .iter()
        .position(|l| l.contains(FORCES_MARKER))
        .ok_or_else(|| DriverError::Evaluator("no forces block found in log".into()))?;
    let start = banner + FORCES_OFFSET;
    let rows = lines.get(start..start + n_atoms).ok_or_else(|| {
        DriverError::Evaluator(format!("forces block is shorter than {n_atoms} atoms"))
    })?;

    let gradient = rows
        .iter()
        .map(|row| {
            let fields: Vec<&str> = row.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(DriverError::Evaluator(format!("bad forces row {row:?}")));
            }
            let tail = &fields[fields.len() - 3..];
            let mut g = [0.0; 3];
            for (gi, s) in g.iter_mut().zip(tail) {
                *gi = -parse_f64(s)?;
            }
            Ok(g)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((energy, gradient))
}

fn field(line: &str, index: usize) -> Result<f64> {
    let s = line
        .split_whitespace()
        .nth(index)
        .ok_or_else(|| DriverError::Evaluator(format!("short energy line {line:?}")))?;
    parse_f64(s)
}

fn parse_f64(s: &str) -> Result<f64> {
    // Gaussian occasionally prints Fortran exponents.
    s.replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| DriverError::Evaluator(format!("cannot parse number {s:?}")))
}

impl Evaluator for Gaussian {
    fn evaluate(&mut self, config: &Configuration) -> Result<Evaluation> {
        if config.n_atoms() != self.atoms.len() {
            return Err(DriverError::Evaluator(format!(
                "received {} atoms but the template describes {}",
                config.n_atoms(),
                self.atoms.len()
            )));
        }

        let angstrom: Vec<[f64; 3]> = config
            .positions
            .iter()
            .map(|x| x.map(|xi| xi / units::ANGSTROM))
            .collect();
        let input = self.workdir.join(INPUT_FILE);
        fs::write(&input, self.render_input(&angstrom)).map_err(|e| {
            DriverError::Evaluator(format!("cannot write {}: {e}", input.display()))
        })?;

        self.run()?;

        let log = self.workdir.join(LOG_FILE);
        let text = fs::read_to_string(&log).map_err(|e| {
            DriverError::Evaluator(format!("cannot read {}: {e}", log.display()))
        })?;
        let (energy, gradient) = parse_log(&text, self.atoms.len())?;

        Ok(Evaluation {
            energy: units::hartree_to_joule(energy),
            gradient: gradient
                .into_iter()
                .map(|g| g.map(units::force_from_wire))
                .collect(),
            extra: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOG: &str = "\
 SCF Done:  E(RB3LYP) =  -1.16533607     A.U. after    8 cycles
 SCF Done:  E(RB3LYP) =  -1.17454263     A.U. after    6 cycles
 -------------------------------------------------------------------
 Center     Atomic                   Forces (Hartrees/Bohr)
 Number     Number              X              Y              Z
 -------------------------------------------------------------------
      1        1           0.000000000    0.000000000    0.012345678
      2        1           0.000000000    0.000000000   -0.012345678
 -------------------------------------------------------------------
";

    fn h2() -> Gaussian {
        Gaussian::new(
            "%chk=h2\n# b3lyp/6-31g force\n\nH2\n\n0 1\n[coord]\n\n",
            vec!["H".into(), "H".into()],
            "g09",
            ".",
        )
    }

    #[test]
    fn parse_log_takes_last_scf_energy() {
        let (energy, gradient) = parse_log(LOG, 2).unwrap();
        assert_eq!(energy, -1.17454263);
        assert_eq!(gradient, vec![[-0.0, -0.0, -0.012345678], [-0.0, -0.0, 0.012345678]]);
    }

    #[test]
    fn parse_log_falls_back_to_energy_line() {
        let log = LOG.replace("SCF Done:", "Skipped");
        let log = format!(" Energy= -0.5 NIter= 0.\n{log}");
        let (energy, _) = parse_log(&log, 2).unwrap();
        assert_eq!(energy, -0.5);
    }

    #[test]
    fn parse_log_without_forces_is_an_error() {
        let err = parse_log(" SCF Done:  E(RHF) =  -1.0  A.U.\n", 2).unwrap_err();
        assert!(matches!(err, DriverError::Evaluator(_)));
    }

    #[test]
    fn parse_log_with_truncated_block_is_an_error() {
        assert!(parse_log(LOG, 5).is_err());
    }

    #[test]
    fn parse_log_accepts_fortran_exponents() {
        let log = LOG.replace("-1.17454263", "-0.117454263D+01");
        let (energy, _) = parse_log(&log, 2).unwrap();
        assert!((energy + 1.17454263).abs() < 1e-12);
    }

    #[test]
    fn render_input_replaces_placeholder() {
        let deck = h2().render_input(&[[0.0, 0.0, 0.0], [0.0, 0.0, 0.74]]);
        assert_eq!(
            deck,
            "%chk=h2\n# b3lyp/6-31g force\n\nH2\n\n0 1\n\
             H       0.00000000       0.00000000       0.00000000\n\
             H       0.00000000       0.00000000       0.74000000\n\n"
        );
    }

    #[test]
    fn atom_count_mismatch_is_rejected_before_running() {
        let cfg = Configuration {
            cell: crate::model::SimulationCell {
                cell: [[0.0; 3]; 3],
                inverse: [[0.0; 3]; 3],
            },
            positions: vec![[0.0; 3]; 3],
        };
        let err = h2().evaluate(&cfg).unwrap_err();
        assert!(matches!(err, DriverError::Evaluator(_)));
    }

    #[cfg(unix)]
    #[test]
    fn evaluate_runs_executable_and_converts_units() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("ipidrv-gaussian-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("canned.log"), LOG).unwrap();

        // Stand-in executable: copies a canned log next to the input deck.
        let exe = dir.join("fake-g09.sh");
        fs::write(&exe, "#!/bin/sh\ntest -f \"$1\" || exit 3\ncp canned.log tmp.log\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let mut g = Gaussian::new(
            "# force\n\nt\n\n0 1\n[coord]\n\n",
            vec!["H".into(), "H".into()],
            &exe,
            &dir,
        );
        let cfg = Configuration {
            cell: crate::model::SimulationCell {
                cell: [[0.0; 3]; 3],
                inverse: [[0.0; 3]; 3],
            },
            positions: vec![[0.0; 3], [0.0, 0.0, 0.74 * units::ANGSTROM]],
        };
        let out = g.evaluate(&cfg).unwrap();

        assert_eq!(out.energy, units::hartree_to_joule(-1.17454263));
        assert_eq!(out.gradient[1][2], units::force_from_wire(0.012345678));
        let deck = fs::read_to_string(dir.join(INPUT_FILE)).unwrap();
        assert!(deck.contains("0.74000000"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
