use std::collections::{HashMap, HashSet};

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::db::players;
use crate::error::Result;
use crate::roster::aliases::NAME_ALIASES;
use crate::roster::feed::{RosterEntry, RosterFeed};

/// Immutable snapshot of the active roster plus the alias table.
///
/// Built once per run and passed by reference to the extractor, the
/// classifier and the reconciler. A roster refresh produces a new snapshot
/// rather than mutating this one.
#[derive(Debug, Clone, Default)]
pub struct PlayerResolver {
    roster: HashMap<String, i64>,
    aliases: HashMap<String, String>,
}

impl PlayerResolver {
    pub fn new(roster: HashMap<String, i64>, aliases: &[(&str, &str)]) -> Self {
        let aliases = aliases
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self { roster, aliases }
    }

    /// Snapshot over the built-in alias table.
    pub fn from_entries(entries: &[RosterEntry]) -> Self {
        let roster = entries.iter().map(|e| (e.name.clone(), e.id)).collect();
        Self::new(roster, NAME_ALIASES)
    }

    /// Canonical roster spelling of a slip name (identity when not aliased).
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.roster.get(self.canonical(name.trim())).copied()
    }

    /// Every string the extractor searches for in slip text: roster names and
    /// alias keys.
    pub fn match_names(&self) -> Vec<&str> {
        self.roster
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub added: usize,
    pub deactivated: usize,
    pub unchanged: usize,
    /// Feed names already held by a different id; left untouched.
    pub conflicts: usize,
}

/// Reconcile the players table with the current feed and return a snapshot
/// of the feed's roster.
pub async fn refresh(
    pool: &SqlitePool,
    feed: &dyn RosterFeed,
) -> Result<(PlayerResolver, RefreshStats)> {
    let fresh = feed.active_players().await?;
    let mut tx = pool.begin().await?;
    let stats = reconcile_players(&mut tx, &fresh).await?;
    tx.commit().await?;

    info!(
        added = stats.added,
        deactivated = stats.deactivated,
        unchanged = stats.unchanged,
        conflicts = stats.conflicts,
        total = fresh.len(),
        "Roster refresh complete: +{} added, -{} deactivated, {} unchanged",
        stats.added,
        stats.deactivated,
        stats.unchanged,
    );

    let accepted: Vec<RosterEntry> = {
        let mut conn = pool.acquire().await?;
        let active = players::active_roster(&mut conn).await?;
        fresh
            .into_iter()
            .filter(|e| active.get(&e.name) == Some(&e.id))
            .collect()
    };
    Ok((PlayerResolver::from_entries(&accepted), stats))
}

/// Snapshot of whatever the store currently holds as active, for runs that
/// skip the roster refresh.
pub async fn load(conn: &mut SqliteConnection) -> Result<PlayerResolver> {
    let roster = players::active_roster(conn).await?;
    Ok(PlayerResolver::new(roster, NAME_ALIASES))
}

async fn reconcile_players(
    conn: &mut SqliteConnection,
    fresh: &[RosterEntry],
) -> Result<RefreshStats> {
    let current = players::active_roster(conn).await?;
    let fresh_ids: HashSet<i64> = fresh.iter().map(|e| e.id).collect();
    let mut stats = RefreshStats::default();

    for entry in fresh {
        if current.get(&entry.name) == Some(&entry.id) {
            stats.unchanged += 1;
            continue;
        }
        if players::upsert_active(conn, entry.id, &entry.name).await? {
            stats.added += 1;
        } else {
            warn!(
                player = %entry.name,
                id = entry.id,
                "Roster name already held by another id, skipping"
            );
            stats.conflicts += 1;
        }
    }

    // Keyed on id so a renamed player stays active under the new name.
    for id in current.values() {
        if !fresh_ids.contains(id) {
            players::mark_inactive(conn, *id).await?;
            stats.deactivated += 1;
        }
    }

    Ok(stats)
}
