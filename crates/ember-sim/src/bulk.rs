//! Bulk incident generation.
//!
//! [`plan`] is pure: the same [`BulkOptions`] and playbook count always
//! yield the same names, timestamps and playbook choices. [`generate`]
//! replays a plan against an [`IncidentService`].

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use ember_core::IncidentService;
use ember_core::model::{Incident, Playbook, Status, StatusUpdateOptions};
use ember_core::permissions::RequesterInfo;

use crate::names::{COMPANY_NAMES, INCIDENT_NAMES};
use crate::rng::DeterministicRng;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Message posted when a generated incident is archived.
pub const ARCHIVE_MESSAGE: &str = "This is now archived.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOptions {
    /// Incidents left in `Reported`.
    pub ongoing: usize,
    /// Incidents archived after creation.
    pub ended: usize,
    /// Creation times fall within this many days before `now`.
    pub days: u32,
    pub seed: u64,
    /// Upper bound for creation times, epoch milliseconds.
    pub now: i64,
}

impl BulkOptions {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.ongoing + self.ended
    }

    /// # Errors
    ///
    /// Fails when `days` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.days == 0 {
            bail!("days must be greater than 0");
        }
        Ok(())
    }
}

/// One incident to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedIncident {
    pub name: String,
    pub create_at: i64,
    pub playbook_index: usize,
    pub ended: bool,
}

/// A created incident, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedIncident {
    pub id: String,
    pub name: String,
    pub channel_id: String,
    pub create_at: i64,
    pub ended: bool,
}

impl GeneratedIncident {
    /// Creation date as `YYYY-MM-DD` (UTC).
    #[must_use]
    pub fn created_date(&self) -> String {
        DateTime::from_timestamp_millis(self.create_at)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn state_label(&self) -> &'static str {
        if self.ended { "Ended" } else { "Ongoing" }
    }
}

/// Deterministic plan for `options`. The first `ended` entries are the
/// ones to archive. A third of the names get a `[Company] ` prefix.
///
/// # Errors
///
/// Fails on invalid options, or when incidents are requested and
/// `playbook_count` is zero.
pub fn plan(options: &BulkOptions, playbook_count: usize) -> Result<Vec<PlannedIncident>> {
    options.validate()?;
    let total = options.total();
    if total == 0 {
        return Ok(Vec::new());
    }
    if playbook_count == 0 {
        bail!("no playbooks available; create at least one playbook before generating data");
    }

    let mut rng = DeterministicRng::new(options.seed);
    let begin = options.now - i64::from(options.days) * DAY_MILLIS;
    let timestamps: Vec<i64> = (0..total)
        .map(|_| rng.in_range(begin, options.now))
        .collect();

    let playbooks = u64::try_from(playbook_count).context("playbook count")?;
    timestamps
        .into_iter()
        .enumerate()
        .map(|(n, create_at)| {
            let playbook_index =
                usize::try_from(rng.below(playbooks)).context("playbook index")?;
            let base = rng.pick(INCIDENT_NAMES).copied().unwrap_or("Incident");
            let name = if rng.one_in(3) {
                let company = rng.pick(COMPANY_NAMES).copied().unwrap_or_default();
                format!("[{company}] {base}")
            } else {
                base.to_string()
            };
            Ok(PlannedIncident {
                name,
                create_at,
                playbook_index,
                ended: n < options.ended,
            })
        })
        .collect()
}

/// Create the planned incidents from the playbooks `requester` can use in
/// `team_id`, backdate them, then archive the ended ones.
///
/// # Errors
///
/// Fails on the first engine error; incidents created before it remain.
pub fn generate(
    service: &IncidentService<'_>,
    requester: &RequesterInfo,
    team_id: &str,
    options: &BulkOptions,
) -> Result<Vec<GeneratedIncident>> {
    let playbooks: Vec<Playbook> = service
        .get_playbooks_for_team(requester, team_id)
        .context("list playbooks")?;
    let planned = plan(options, playbooks.len())?;
    tracing::info!(
        count = planned.len(),
        seed = options.seed,
        team_id,
        "generating bulk incidents"
    );

    let mut generated = Vec::with_capacity(planned.len());
    for entry in &planned {
        let playbook = &playbooks[entry.playbook_index];
        let incident = service
            .create_incident(
                Incident::new(&entry.name, &requester.user_id, team_id),
                Some(playbook),
                true,
            )
            .with_context(|| format!("create incident '{}'", entry.name))?;
        service
            .change_creation_date(&incident.id, entry.create_at)
            .with_context(|| format!("backdate incident {}", incident.id))?;
        generated.push(GeneratedIncident {
            id: incident.id,
            name: incident.name,
            channel_id: incident.channel_id,
            create_at: entry.create_at,
            ended: entry.ended,
        });
    }

    let archive = StatusUpdateOptions {
        status: Status::Archived,
        message: ARCHIVE_MESSAGE.to_string(),
        ..StatusUpdateOptions::default()
    };
    for incident in generated.iter().filter(|g| g.ended) {
        service
            .update_status(&incident.id, &requester.user_id, &archive)
            .with_context(|| format!("archive incident {}", incident.id))?;
    }
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(ongoing: usize, ended: usize, seed: u64) -> BulkOptions {
        BulkOptions {
            ongoing,
            ended,
            days: 30,
            seed,
            now: 1_700_000_000_000,
        }
    }

    #[test]
    fn same_seed_same_plan() {
        let a = plan(&options(5, 3, 99), 2).expect("plan");
        let b = plan(&options(5, 3, 99), 2).expect("plan");
        assert_eq!(a, b);
        assert_ne!(a, plan(&options(5, 3, 100), 2).expect("plan"));
    }

    #[test]
    fn ended_entries_come_first() {
        let planned = plan(&options(2, 3, 1), 1).expect("plan");
        let ended: Vec<bool> = planned.iter().map(|p| p.ended).collect();
        assert_eq!(ended, [true, true, true, false, false]);
    }

    #[test]
    fn timestamps_fall_inside_the_window() {
        let opts = options(40, 0, 5);
        let begin = opts.now - 30 * DAY_MILLIS;
        for entry in plan(&opts, 3).expect("plan") {
            assert!((begin..opts.now).contains(&entry.create_at));
            assert!(entry.playbook_index < 3);
        }
    }

    #[test]
    fn zero_total_needs_no_playbooks() {
        assert!(plan(&options(0, 0, 1), 0).expect("plan").is_empty());
        assert!(plan(&options(1, 0, 1), 0).is_err());
    }

    #[test]
    fn zero_days_rejected() {
        let mut opts = options(1, 0, 1);
        opts.days = 0;
        assert!(plan(&opts, 1).is_err());
    }

    #[test]
    fn names_come_from_the_pools() {
        for entry in plan(&options(60, 0, 11), 1).expect("plan") {
            let base = entry
                .name
                .split_once("] ")
                .map_or(entry.name.as_str(), |(_, rest)| rest);
            assert!(INCIDENT_NAMES.contains(&base), "unexpected name {}", entry.name);
        }
    }
}
