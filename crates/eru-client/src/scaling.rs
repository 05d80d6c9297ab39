//! Autoscaling planners
//!
//! Containers sharing (version, entrypoint, env) form a cohort, the unit
//! the planners reason about. Scale-out grows each cohort up to a
//! ceiling; scale-in retires the oldest containers of each cohort down
//! to a floor. Both planners work from a fresh container snapshot on
//! every call and hold no state between invocations.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use ipnet::IpNet;
use tracing::{info, warn};

use crate::client::{DeployOptions, EruClient};
use crate::error::{EruError, EruResult};
use crate::models::{CohortKey, Container, RemovalResult, ScaleOutReport, ScaleOutcome};

/// Max containers a cohort may hold unless the caller overrides it.
pub const DEFAULT_CEILING: u64 = 50;

/// Containers scale-in leaves in a cohort unless the caller overrides it.
pub const DEFAULT_FLOOR: u64 = 2;

/// Containers fetched per planning snapshot.
const SNAPSHOT_LIMIT: u64 = 100;

/// Parameters for [`EruClient::scale_out`].
#[derive(Debug, Clone)]
pub struct ScaleOutOptions {
    /// Cores per new container; defaults to the full-core count of the
    /// cohort's first container.
    pub ncore: Option<f64>,
    /// Containers to add per cohort; defaults to the cohort's current
    /// size, doubling it.
    pub ncontainer: Option<u64>,
    /// Target pod; defaults to the pod holding the most eligible
    /// containers of the application.
    pub pod_name: Option<String>,
    /// Max cohort size after scaling.
    pub ceiling: u64,
    /// When non-empty, only cohorts with these entrypoints are scaled.
    pub entrypoints: Vec<String>,
}

impl Default for ScaleOutOptions {
    fn default() -> Self {
        Self {
            ncore: None,
            ncontainer: None,
            pod_name: None,
            ceiling: DEFAULT_CEILING,
            entrypoints: Vec::new(),
        }
    }
}

/// Parameters for [`EruClient::scale_in`].
#[derive(Debug, Clone)]
pub struct ScaleInOptions {
    /// When non-empty, only containers on these pods are considered;
    /// the filter applies before cohorts are formed.
    pub pod_names: Vec<String>,
    /// When non-empty, only cohorts with these entrypoints are shrunk.
    pub entrypoints: Vec<String>,
    /// Cohorts are never shrunk when at or below this size.
    pub floor: u64,
}

impl Default for ScaleInOptions {
    fn default() -> Self {
        Self {
            pod_names: Vec::new(),
            entrypoints: Vec::new(),
            floor: DEFAULT_FLOOR,
        }
    }
}

/// Containers sharing version, entrypoint and environment.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub key: CohortKey,
    pub containers: Vec<Container>,
}

/// Group containers into cohorts.
///
/// Containers already being torn down (`in_removal`) are dropped, as are
/// containers whose entrypoint is not in `entrypoints` when the filter
/// is non-empty. Cohorts come back in first-encountered order and each
/// cohort keeps the snapshot's relative container order, so grouping an
/// unchanged snapshot twice yields identical results.
pub fn group_cohorts(containers: &[Container], entrypoints: &[String]) -> Vec<Cohort> {
    let mut index: HashMap<CohortKey, usize> = HashMap::new();
    let mut cohorts: Vec<Cohort> = Vec::new();

    for container in containers {
        if container.in_removal {
            continue;
        }
        if !entrypoints.is_empty() && !entrypoints.iter().any(|e| e == &container.entrypoint) {
            continue;
        }

        let key = CohortKey {
            version: container.version.clone(),
            entrypoint: container.entrypoint.clone(),
            env: container.env.clone(),
        };
        match index.get(&key) {
            Some(&at) => cohorts[at].containers.push(container.clone()),
            None => {
                index.insert(key.clone(), cohorts.len());
                cohorts.push(Cohort {
                    key,
                    containers: vec![container.clone()],
                });
            }
        }
    }

    cohorts
}

/// The pod holding the most of the given containers, ties broken by
/// which pod was seen first.
pub fn most_common_pod<'a, I>(containers: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Container>,
{
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for container in containers {
        match counts.iter_mut().find(|(name, _)| *name == container.podname) {
            Some((_, n)) => *n += 1,
            None => counts.push((&container.podname, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, n) in counts {
        match best {
            Some((_, m)) if m >= n => {}
            _ => best = Some((name, n)),
        }
    }
    best.map(|(name, _)| name.to_string())
}

/// Bounded scale-out delta for a cohort of `current` containers.
///
/// `requested` falls back to `current` (doubling); the projected size is
/// clamped to `ceiling`. `None` means the cohort cannot grow by even one
/// container.
pub fn bounded_increment(current: usize, requested: Option<u64>, ceiling: u64) -> Option<u64> {
    let current = current as u64;
    let requested = requested.unwrap_or(current);

    let should_add = if current + requested <= ceiling {
        requested
    } else {
        ceiling.saturating_sub(current)
    };

    if should_add < 1 {
        None
    } else {
        Some(should_add)
    }
}

/// Choose which containers to retire from a cohort.
///
/// Nothing is selected when the cohort is at or below `floor`, or does
/// not hold more than `count` containers. Otherwise the `count` oldest
/// by creation time go first, on the assumption that newer containers
/// carry more recent deploys.
pub fn select_victims(cohort: &[Container], count: u64, floor: u64) -> Vec<String> {
    let current = cohort.len() as u64;
    if current <= floor || current <= count {
        return Vec::new();
    }

    let mut by_age: Vec<&Container> = cohort.iter().collect();
    by_age.sort_by(|a, b| {
        (parse_created(&a.created), a.created.as_str())
            .cmp(&(parse_created(&b.created), b.created.as_str()))
    });

    by_age
        .into_iter()
        .take(count as usize)
        .map(|c| c.container_id.clone())
        .collect()
}

/// ERU reports `created` as `2015-05-12 10:23:20`; newer servers emit
/// RFC 3339. Unparseable values fall back to lexicographic order.
fn parse_created(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// First address of an attached network's CIDR block: new containers
/// request the network's base identity rather than copying an
/// already-assigned host address.
fn network_base(cidr: &str) -> EruResult<String> {
    let net: IpNet = cidr
        .parse()
        .map_err(|e| EruError::InvalidRequest(format!("bad network address {}: {}", cidr, e)))?;
    Ok(net.network().to_string())
}

impl EruClient {
    /// Scale an application out, cohort by cohort.
    ///
    /// Takes a fresh snapshot of the app's containers, groups them into
    /// cohorts and issues one private deploy per cohort. Every cohort is
    /// attempted exactly once; a cohort already at the ceiling is
    /// recorded and skipped without aborting its siblings.
    ///
    /// Returns the per-cohort report. When any cohort could not be
    /// scaled the call fails with [`EruError::ScaleLimit`] (all failures
    /// were ceiling hits) or [`EruError::ScaleAggregate`] (at least one
    /// deploy attempt failed); both carry the same report.
    ///
    /// Two overlapping calls for one application read the same snapshot
    /// and will both add containers. Callers needing exclusion must
    /// serialize externally.
    pub async fn scale_out(
        &self,
        app_name: &str,
        opts: ScaleOutOptions,
    ) -> EruResult<Vec<ScaleOutReport>> {
        let containers = self
            .list_app_containers(app_name, 0, SNAPSHOT_LIMIT)
            .await?;
        let cohorts = group_cohorts(&containers, &opts.entrypoints);
        if cohorts.is_empty() {
            info!(app = %app_name, "no eligible containers, nothing to scale");
            return Ok(Vec::new());
        }

        let pod_name = match opts.pod_name.clone() {
            Some(name) => name,
            None => most_common_pod(cohorts.iter().flat_map(|c| &c.containers)).ok_or_else(
                || EruError::InvalidRequest(format!("no pod to scale {} in", app_name)),
            )?,
        };

        let mut report: Vec<ScaleOutReport> = Vec::new();
        for cohort in &cohorts {
            report.push(self.scale_out_cohort(app_name, &pod_name, cohort, &opts).await);
        }

        let total = report.len();
        let failed = report.iter().filter(|r| !r.is_ok()).count();
        if failed == 0 {
            return Ok(report);
        }

        let deploy_failed = report
            .iter()
            .any(|r| matches!(r.outcome, ScaleOutcome::Failed { .. }));
        if !deploy_failed {
            // every failure is a ceiling hit; name the first one
            let first = report.iter().find_map(|entry| match entry.outcome {
                ScaleOutcome::AtCeiling { current, ceiling } => Some((
                    entry.cohort.version.clone(),
                    entry.cohort.entrypoint.clone(),
                    entry.cohort.env.clone(),
                    current,
                    ceiling,
                )),
                _ => None,
            });
            if let Some((version, entrypoint, env, current, ceiling)) = first {
                return Err(EruError::ScaleLimit {
                    version,
                    entrypoint,
                    env,
                    current,
                    ceiling,
                    report,
                });
            }
        }

        Err(EruError::ScaleAggregate {
            failed,
            total,
            report,
        })
    }

    async fn scale_out_cohort(
        &self,
        app_name: &str,
        pod_name: &str,
        cohort: &Cohort,
        opts: &ScaleOutOptions,
    ) -> ScaleOutReport {
        let key = cohort.key.clone();
        let current = cohort.containers.len();

        let added = match bounded_increment(current, opts.ncontainer, opts.ceiling) {
            Some(n) => n,
            None => {
                warn!(
                    app = %app_name,
                    version = %key.version,
                    entrypoint = %key.entrypoint,
                    env = %key.env,
                    current = current,
                    ceiling = opts.ceiling,
                    "cohort already at ceiling"
                );
                return ScaleOutReport {
                    cohort: key,
                    podname: pod_name.to_string(),
                    outcome: ScaleOutcome::AtCeiling {
                        current,
                        ceiling: opts.ceiling,
                    },
                };
            }
        };

        // containers sharing a cohort are interchangeable, any one works
        // as the template
        let sample = &cohort.containers[0];
        let networks: EruResult<Vec<String>> = sample
            .networks
            .iter()
            .map(|n| network_base(&n.vlan_address))
            .collect();
        let networks = match networks {
            Ok(networks) => networks,
            Err(e) => {
                return ScaleOutReport {
                    cohort: key,
                    podname: pod_name.to_string(),
                    outcome: ScaleOutcome::Failed {
                        added: 0,
                        error: e.to_string(),
                    },
                };
            }
        };
        let ncore = opts.ncore.unwrap_or(sample.cores.full.len() as f64);

        info!(
            app = %app_name,
            pod = %pod_name,
            version = %key.version,
            entrypoint = %key.entrypoint,
            env = %key.env,
            current = current,
            added = added,
            "scaling out cohort"
        );

        let outcome = match self
            .deploy_private(
                pod_name,
                app_name,
                ncore,
                added,
                &key.version,
                &key.entrypoint,
                &key.env,
                &networks,
                &DeployOptions::default(),
            )
            .await
        {
            Ok(result) if result.is_ok() => ScaleOutcome::Deployed { added, result },
            Ok(result) => {
                warn!(
                    app = %app_name,
                    version = %key.version,
                    entrypoint = %key.entrypoint,
                    r = result.r,
                    msg = %result.msg,
                    "server rejected deploy"
                );
                ScaleOutcome::Failed {
                    added,
                    error: format!("server returned r={}: {}", result.r, result.msg),
                }
            }
            Err(e) => ScaleOutcome::Failed {
                added,
                error: e.to_string(),
            },
        };

        ScaleOutReport {
            cohort: key,
            podname: pod_name.to_string(),
            outcome,
        }
    }

    /// Scale an application in by retiring the oldest containers of each
    /// cohort, never shrinking a cohort at or below `floor`.
    ///
    /// Victim ids from all cohorts are accumulated into a single removal
    /// request, which is issued even when no cohort yields a victim;
    /// the server treats an empty id list as a no-op.
    pub async fn scale_in(
        &self,
        app_name: &str,
        ncontainer: u64,
        opts: ScaleInOptions,
    ) -> EruResult<RemovalResult> {
        let mut containers = self
            .list_app_containers(app_name, 0, SNAPSHOT_LIMIT)
            .await?;
        if !opts.pod_names.is_empty() {
            containers.retain(|c| opts.pod_names.iter().any(|p| p == &c.podname));
        }

        let cohorts = group_cohorts(&containers, &opts.entrypoints);

        let mut to_remove: Vec<String> = Vec::new();
        for cohort in &cohorts {
            let victims = select_victims(&cohort.containers, ncontainer, opts.floor);
            if victims.is_empty() {
                info!(
                    app = %app_name,
                    version = %cohort.key.version,
                    entrypoint = %cohort.key.entrypoint,
                    env = %cohort.key.env,
                    current = cohort.containers.len(),
                    floor = opts.floor,
                    "cohort at floor, nothing to remove"
                );
                continue;
            }
            info!(
                app = %app_name,
                version = %cohort.key.version,
                entrypoint = %cohort.key.entrypoint,
                env = %cohort.key.env,
                removing = victims.len(),
                "retiring oldest containers"
            );
            to_remove.extend(victims);
        }

        self.remove_containers(&to_remove).await
    }
}
