//! The reconciliation engine.
//!
//! One cycle materializes the full remote dataset into the directory store
//! and then removes what no longer exists remotely. Groups load before
//! users so membership back-references can be attached at user creation;
//! purges run last so a user whose membership changed mid-cycle is not
//! removed by mistake. Everything inside a cycle is sequential.

use crate::report::{CycleError, CyclePhase, CycleReport};
use crate::Result;
use chrono::Utc;
use idmirror_core::ids::{CycleId, RemoteGroupId, RemoteUserId};
use idmirror_core::Error;
use idmirror_directory::{
    group_entry, principal_entry, DirectoryStore, Dn, MirrorLayout, ATTR_DESCRIPTION, ATTR_MEMBER,
    OC_GROUP, OC_PERSON,
};
use idmirror_idp::{AccessToken, IdentityService, PageCursor};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Cycle-scoped map from remote group id to the group's directory name.
///
/// Built during the group load phase and handed to the user load phase as
/// an explicit parameter; it never survives the cycle that built it.
#[derive(Debug, Default)]
pub struct GroupIndex {
    by_id: HashMap<RemoteGroupId, Dn>,
}

impl GroupIndex {
    fn insert(&mut self, id: RemoteGroupId, dn: Dn) {
        self.by_id.insert(id, dn);
    }

    /// Resolves a remote group id to the directory name materialized for
    /// it in this cycle.
    #[must_use]
    pub fn resolve(&self, id: &RemoteGroupId) -> Option<&Dn> {
        self.by_id.get(id)
    }

    /// Number of groups seen this cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if no groups were seen this cycle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Drives full sync cycles against the directory store.
///
/// The engine is stateless between cycles: a fresh token, cursor, and group
/// index are created every run, and the only state that persists is the
/// store itself.
pub struct ReconciliationEngine {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn DirectoryStore>,
    layout: MirrorLayout,
    page_size: u32,
}

impl ReconciliationEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn DirectoryStore>,
        layout: MirrorLayout,
        page_size: u32,
    ) -> Self {
        Self {
            identity,
            store,
            layout,
            page_size: page_size.max(1),
        }
    }

    /// Runs one full reconciliation cycle.
    ///
    /// Never returns an error: every failure is folded into the report so
    /// the scheduler's behavior is always well-defined. A load phase that
    /// did not complete disables its purge phase for this cycle, so a
    /// partially fetched dataset can never make live remote entries look
    /// purge-eligible.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = CycleId::new();
        let started_at = Utc::now();
        info!(cycle = %cycle_id, "reconciliation cycle starting");

        let mut groups_loaded = 0;
        let mut users_loaded = 0;
        let mut users_purged = 0;
        let mut groups_purged = 0;
        let mut first_error: Option<CycleError> = None;
        let mut groups_complete = false;
        let mut users_complete = false;

        match self.identity.service_login().await {
            Ok(token) => {
                match self.load_groups(&token).await {
                    Ok((count, index)) => {
                        groups_loaded = count;
                        groups_complete = true;

                        match self.load_users(&token, &index).await {
                            Ok(count) => {
                                users_loaded = count;
                                users_complete = true;
                            }
                            Err(err) => {
                                self.log_phase_error(cycle_id, CyclePhase::LoadingUsers, &err);
                                first_error = Some(CycleError::new(CyclePhase::LoadingUsers, &err));
                            }
                        }
                    }
                    Err(err) => {
                        self.log_phase_error(cycle_id, CyclePhase::LoadingGroups, &err);
                        first_error = Some(CycleError::new(CyclePhase::LoadingGroups, &err));
                    }
                }

                if users_complete {
                    match self.purge_users(&token).await {
                        Ok(count) => users_purged = count,
                        Err(err) => {
                            self.log_phase_error(cycle_id, CyclePhase::PurgingUsers, &err);
                            first_error = first_error
                                .or_else(|| Some(CycleError::new(CyclePhase::PurgingUsers, &err)));
                        }
                    }
                } else {
                    info!(cycle = %cycle_id, "user load incomplete, skipping user purge");
                }

                if groups_complete {
                    match self.purge_groups(&token).await {
                        Ok(count) => groups_purged = count,
                        Err(err) => {
                            self.log_phase_error(cycle_id, CyclePhase::PurgingGroups, &err);
                            first_error = first_error
                                .or_else(|| Some(CycleError::new(CyclePhase::PurgingGroups, &err)));
                        }
                    }
                } else {
                    info!(cycle = %cycle_id, "group load incomplete, skipping group purge");
                }
            }
            Err(err) => {
                self.log_phase_error(cycle_id, CyclePhase::Authenticating, &err);
                first_error = Some(CycleError::new(CyclePhase::Authenticating, &err));
            }
        }

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            groups_loaded,
            users_loaded,
            users_purged,
            groups_purged,
            error: first_error,
        };

        if report.succeeded() {
            info!(
                cycle = %cycle_id,
                groups = report.groups_loaded,
                users = report.users_loaded,
                users_purged = report.users_purged,
                groups_purged = report.groups_purged,
                "reconciliation cycle complete"
            );
        }
        report
    }

    /// Pages the remote group collection into the store and builds the
    /// cycle's group index.
    async fn load_groups(&self, token: &AccessToken) -> Result<(u64, GroupIndex)> {
        let mut cursor = PageCursor::new(self.page_size);
        let mut index = GroupIndex::default();
        let mut loaded = 0;

        while cursor.has_more() {
            let page = self
                .identity
                .list_groups(token, cursor.offset(), cursor.page_size())
                .await?;
            cursor.record_total(page.total);

            for group in &page.groups {
                let entry = group_entry(&self.layout, &group.name, group.id.as_str());
                index.insert(group.id.clone(), entry.dn().clone());
                self.store.upsert(entry).await?;
                debug!(group = %group.name, "mirrored group");
                loaded += 1;
            }
            cursor.advance();
        }

        Ok((loaded, index))
    }

    /// Pages the remote user collection into the store, resolving group
    /// membership against `index`.
    async fn load_users(&self, token: &AccessToken, index: &GroupIndex) -> Result<u64> {
        let mut cursor = PageCursor::new(self.page_size);
        let mut loaded = 0;

        while cursor.has_more() {
            let page = self
                .identity
                .list_users(token, cursor.offset(), cursor.page_size())
                .await?;
            cursor.record_total(page.total);

            for user in &page.users {
                let mut member_of = Vec::new();
                for group_id in user.group_ids() {
                    match index.resolve(group_id) {
                        Some(dn) => member_of.push(dn.clone()),
                        // Not seen this cycle; the link repairs itself next
                        // cycle once the group materializes.
                        None => debug!(
                            user = %user.login,
                            group = %group_id,
                            "dropping membership link to a group not seen this cycle"
                        ),
                    }
                }

                let ssh_keys = self.fetch_ssh_keys(token, &user.id).await;
                let entry = principal_entry(
                    &self.layout,
                    &user.name,
                    user.id.as_str(),
                    &user.login,
                    user.email(),
                    &member_of,
                    &ssh_keys,
                );
                let principal_dn = entry.dn().clone();
                self.store.upsert(entry).await?;

                for group_dn in &member_of {
                    self.store
                        .append_attribute(group_dn, ATTR_MEMBER, principal_dn.as_str())
                        .await?;
                }

                debug!(user = %user.login, "mirrored user");
                loaded += 1;
            }
            cursor.advance();
        }

        Ok(loaded)
    }

    /// Fetches a user's public SSH keys, best effort.
    ///
    /// A failure here degrades to a key-less principal instead of aborting
    /// the user load phase.
    async fn fetch_ssh_keys(&self, token: &AccessToken, id: &RemoteUserId) -> Vec<String> {
        let mut cursor = PageCursor::new(self.page_size);
        let mut keys = Vec::new();

        while cursor.has_more() {
            match self
                .identity
                .list_ssh_keys(token, id, cursor.offset(), cursor.page_size())
                .await
            {
                Ok(page) => {
                    cursor.record_total(page.total);
                    keys.extend(page.keys.into_iter().map(|key| key.open_ssh_key));
                    cursor.advance();
                }
                Err(err) => {
                    warn!(user = %id, error = %err, "failed to fetch SSH keys");
                    break;
                }
            }
        }

        keys
    }

    /// Removes mirrored principals whose remote record is gone.
    async fn purge_users(&self, token: &AccessToken) -> Result<u64> {
        let entries = self.store.find_by_object_class(OC_PERSON).await?;
        let mut purged = 0;

        for entry in entries {
            if !entry.dn().is_descendant_of(self.layout.users_base()) {
                continue;
            }
            let Some(id) = entry.first(ATTR_DESCRIPTION).map(RemoteUserId::from) else {
                warn!(dn = %entry.dn(), "principal entry has no remote id, skipping");
                continue;
            };

            let stale = match self.identity.get_user(token, &id).await {
                Ok(user) if user.id == id => false,
                // The id answered with a different record; treat the local
                // entry as stale (defensive check against id reuse).
                Ok(_) => true,
                Err(Error::NotFound(_)) => true,
                Err(err) => {
                    warn!(dn = %entry.dn(), error = %err, "user existence probe failed");
                    continue;
                }
            };

            if stale {
                match self.store.delete(entry.dn()).await {
                    Ok(()) => {
                        info!(dn = %entry.dn(), "purged stale principal");
                        purged += 1;
                    }
                    Err(err) => warn!(dn = %entry.dn(), error = %err, "failed to purge principal"),
                }
            }
        }

        Ok(purged)
    }

    /// Removes mirrored groups whose remote record is gone.
    async fn purge_groups(&self, token: &AccessToken) -> Result<u64> {
        let entries = self.store.find_by_object_class(OC_GROUP).await?;
        let mut purged = 0;

        for entry in entries {
            if !entry.dn().is_descendant_of(self.layout.groups_base()) {
                continue;
            }
            let Some(id) = entry.first(ATTR_DESCRIPTION).map(RemoteGroupId::from) else {
                warn!(dn = %entry.dn(), "group entry has no remote id, skipping");
                continue;
            };

            let stale = match self.identity.get_group(token, &id).await {
                Ok(group) if group.id == id => false,
                Ok(_) => true,
                Err(Error::NotFound(_)) => true,
                Err(err) => {
                    warn!(dn = %entry.dn(), error = %err, "group existence probe failed");
                    continue;
                }
            };

            if stale {
                match self.store.delete(entry.dn()).await {
                    Ok(()) => {
                        info!(dn = %entry.dn(), "purged stale group");
                        purged += 1;
                    }
                    Err(err) => warn!(dn = %entry.dn(), error = %err, "failed to purge group"),
                }
            }
        }

        Ok(purged)
    }

    fn log_phase_error(&self, cycle: CycleId, phase: CyclePhase, err: &Error) {
        if err.should_log() {
            error!(cycle = %cycle, %phase, error = %err, "reconciliation phase failed");
        } else {
            warn!(cycle = %cycle, %phase, error = %err, "reconciliation phase failed");
        }
    }
}
