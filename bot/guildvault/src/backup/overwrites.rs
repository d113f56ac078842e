use crate::models::{GuildSnapshot, OverwriteTarget, PermissionTable};
use crate::platform::{GuildView, LiveRole, Overwrite, OverwriteHandle};
use crate::prelude::*;
use std::collections::{HashMap, HashSet};

/// Everything needed to turn snapshot overwrite keys into live targets on
/// the guild being restored.
#[derive(Clone, Debug)]
pub struct OverwriteContext {
    everyone: Id<RoleMarker>,
    /// Roles present on the guild, existing ones first, then the ones
    /// created during this restore.
    roles: Vec<LiveRole>,
    members: HashSet<Id<UserMarker>>,
    id_map: HashMap<u64, Id<RoleMarker>>,
    source_role_names: HashMap<u64, String>,
}

impl OverwriteContext {
    pub fn new(view: &GuildView, snapshot: &GuildSnapshot) -> Self {
        Self {
            everyone: view.everyone_role(),
            roles: view.roles.clone(),
            members: HashSet::new(),
            id_map: HashMap::new(),
            source_role_names: snapshot
                .roles
                .iter()
                .map(|role| (role.id, role.name.clone()))
                .collect(),
        }
    }

    /// Registers roles created earlier in the same restore.
    pub fn with_restored_roles(
        mut self,
        created: &[LiveRole],
        id_map: &HashMap<u64, Id<RoleMarker>>,
    ) -> Self {
        self.roles.extend(created.iter().cloned());
        self.id_map
            .extend(id_map.iter().map(|(old, new)| (*old, *new)));
        self
    }

    pub fn with_members(mut self, members: HashSet<Id<UserMarker>>) -> Self {
        self.members = members;
        self
    }

    /// Resolves a source role id. Falls back, in order, to a role created in
    /// this run, a role that still has the same id, the first role carrying
    /// the name the snapshot recorded, and finally `@everyone`.
    pub fn resolve_role(&self, source_id: u64) -> Id<RoleMarker> {
        if let Some(id) = self.id_map.get(&source_id) {
            return *id;
        }

        if let Some(id) = Id::new_checked(source_id) {
            if self.roles.iter().any(|role| role.id == id) {
                return id;
            }
        }

        let by_name = self
            .source_role_names
            .get(&source_id)
            .and_then(|name| self.roles.iter().find(|role| &role.name == name));
        match by_name {
            Some(role) => role.id,
            None => {
                debug!(
                    "Role {} could not be resolved, falling back to @everyone",
                    source_id
                );
                self.everyone
            }
        }
    }

    /// Members who left the guild resolve to `None`.
    pub fn resolve_member(&self, source_id: u64) -> Option<Id<UserMarker>> {
        Id::new_checked(source_id).filter(|id| self.members.contains(id))
    }
}

/// Converts a serialized overwrite table into live overwrites.
///
/// Entries with neither allowed nor denied bits are skipped. When several
/// entries land on the same target, the last one in key order wins.
pub fn translate(table: &PermissionTable, ctx: &OverwriteContext) -> Vec<Overwrite> {
    let mut overwrites: Vec<Overwrite> = Vec::with_capacity(table.len());
    for (key, pair) in table {
        if pair.is_empty() {
            continue;
        }
        let target = match OverwriteTarget::parse(key) {
            Some(OverwriteTarget::Role(id)) => OverwriteHandle::Role(ctx.resolve_role(id)),
            Some(OverwriteTarget::Member(id)) => match ctx.resolve_member(id) {
                Some(member) => OverwriteHandle::Member(member),
                None => {
                    debug!("Dropping overwrite for departed member {}", id);
                    continue;
                }
            },
            None => {
                warn!("Skipping malformed overwrite key {:?}", key);
                continue;
            }
        };

        let overwrite = Overwrite {
            target,
            allow: pair.allow,
            deny: pair.deny,
        };
        match overwrites.iter_mut().find(|o| o.target == target) {
            Some(existing) => *existing = overwrite,
            None => overwrites.push(overwrite),
        }
    }
    overwrites
}
