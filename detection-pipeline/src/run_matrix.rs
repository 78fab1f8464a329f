//! The run id × caldb × irf combinations processed in one invocation, and
//! where each one logs.

use rta_common::{RtaResult, RunConfig, Seed, log_row::RowContext};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Combination {
    pub(crate) runid: String,
    pub(crate) caldb: String,
    pub(crate) irf: String,
}

/// Every combination, in sorted order with the run id outermost.
pub(crate) fn combinations(run: &RunConfig) -> RtaResult<Vec<Combination>> {
    let (caldbs, irfs) = (run.caldbs(), run.irfs());
    let mut combinations = Vec::new();
    for runid in run.run_ids()? {
        for caldb in &caldbs {
            for irf in &irfs {
                combinations.push(Combination {
                    runid: runid.clone(),
                    caldb: caldb.clone(),
                    irf: irf.clone(),
                });
            }
        }
    }
    Ok(combinations)
}

fn seed_range(run: &RunConfig) -> (Seed, Seed) {
    (run.start_count + 1, run.start_count + run.trials)
}

impl Combination {
    pub(crate) fn row_context(&self, run: &RunConfig) -> RowContext {
        RowContext {
            runid: self.runid.clone(),
            offset: run.offset,
            delay: run.delay,
            scale_flux: run.scale_flux_factor,
            caldb: self.caldb.clone(),
            irf: self.irf.clone(),
        }
    }

    pub(crate) fn aperture_log(&self, run: &RunConfig, pipe: &str) -> PathBuf {
        let (first, last) = seed_range(run);
        run.outputs_dir(&self.runid).join(format!(
            "{pipe}-{}-{}-seed{first:06}-{last:06}.txt",
            self.caldb, self.irf
        ))
    }

    pub(crate) fn blind_search_log(&self, run: &RunConfig) -> PathBuf {
        let (first, last) = seed_range(run);
        run.outputs_dir(&self.runid).join(format!(
            "{}-{}_seed{first:06}-{:06}_flux{}_offset{}_delay{}.txt",
            self.caldb,
            self.irf,
            last + 1,
            run.scale_flux_factor,
            run.offset,
            run.delay
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn run() -> RunConfig {
        serde_json::from_str(
            r#"{
                "data": "/data", "catalog": "/catalog", "caldb-root": "/caldb",
                "runid": ["run0406_ID000126", "run0367_ID000126"],
                "caldb": ["prod5", "prod3b"], "irf": "South_z40_0.5h",
                "trials": 10, "start-count": 20, "offset": 0.5, "delay": 50, "tobs": 600,
                "emin": 0.04, "emax": 1.0, "roi": 2.5
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn combinations_are_sorted() {
        let combinations = combinations(&run()).unwrap();
        let names = combinations
            .iter()
            .map(|c| format!("{}/{}/{}", c.runid, c.caldb, c.irf))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "run0367_ID000126/prod3b/South_z40_0.5h",
                "run0367_ID000126/prod5/South_z40_0.5h",
                "run0406_ID000126/prod3b/South_z40_0.5h",
                "run0406_ID000126/prod5/South_z40_0.5h",
            ]
        );
    }

    #[test]
    fn log_names() {
        let run = run();
        let combination = Combination {
            runid: "run0406_ID000126".to_owned(),
            caldb: "prod5".to_owned(),
            irf: "South_z40_0.5h".to_owned(),
        };
        assert_eq!(
            combination.aperture_log(&run, "rtatool1d"),
            Path::new("/data/outputs/run0406_ID000126/rtatool1d-prod5-South_z40_0.5h-seed000021-000030.txt")
        );
        assert_eq!(
            combination.blind_search_log(&run),
            Path::new("/data/outputs/run0406_ID000126/prod5-South_z40_0.5h_seed000021-000031_flux1_offset0.5_delay50.txt")
        );
        assert_eq!(combination.row_context(&run).delay, 50.0);
    }
}
